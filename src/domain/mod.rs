pub mod business;
pub mod contact;
pub mod criteria;
pub mod email;
pub mod html_tag;
pub mod lead;
pub mod progress;
pub mod search_result;
pub mod web_url;
