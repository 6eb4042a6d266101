use super::business::TeamMember;

const ROLE_KEYWORDS: [&str; 22] = [
    "ceo", "cto", "cfo", "coo", "cmo", "founder", "co-founder", "owner", "partner",
    "president", "director", "manager", "head", "lead", "officer", "chief", "vp",
    "principal", "executive", "chair", "strategist", "consultant",
];

/// Text pulled out of a page element, tagged by where it was found.
#[derive(Debug, PartialEq, Clone)]
pub enum HtmlTag {
    TitleTag(String),
    HeadingTag(String),
    TeamCardTag(String),
}

/// Company name from a `<title>`, e.g. "Acme Digital | Growth Marketing" -> "Acme Digital".
pub fn extract_company_name(tag: &HtmlTag) -> Option<String> {
    match tag {
        HtmlTag::TitleTag(content) | HtmlTag::HeadingTag(content) => {
            let strategies = [" | ", " - ", " – ", " — ", ": ", " · "];

            let name = strategies
                .iter()
                .filter_map(|st| content.split_once(st).map(|parts| parts.0.trim()))
                .min_by_key(|part| part.len())
                .unwrap_or(content.trim());

            match name.is_empty() {
                true => None,
                false => Some(name.to_string()),
            }
        }
        HtmlTag::TeamCardTag(_) => None,
    }
}

/// Person from a team card or heading such as "Jane Doe - Founder & CEO" or "Jane Doe\nCEO".
pub fn extract_team_member(tag: &HtmlTag) -> Option<TeamMember> {
    let content = match tag {
        HtmlTag::TeamCardTag(content) | HtmlTag::HeadingTag(content) => content,
        HtmlTag::TitleTag(_) => return None,
    };

    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if let [name, title, ..] = lines.as_slice() {
        if looks_like_person_name(name) && looks_like_role(title) {
            return Some(TeamMember::new(name, title));
        }
    }

    let single_line = lines.join(" ");
    let strategies = [" - ", " – ", " — ", " | ", ", "];

    strategies
        .iter()
        .filter_map(|st| single_line.split_once(st))
        .find(|(name, title)| looks_like_person_name(name.trim()) && looks_like_role(title.trim()))
        .map(|(name, title)| TeamMember::new(name, title))
}

pub fn looks_like_person_name(text: &str) -> bool {
    let text = text.trim();
    let text = text
        .strip_prefix("Dr.")
        .or_else(|| text.strip_prefix("Dr "))
        .unwrap_or(text)
        .trim();
    let words: Vec<&str> = text.split_whitespace().collect();

    (2..=4).contains(&words.len())
        && text.len() <= 50
        && !looks_like_role(text)
        && words.iter().all(|word| {
            word.chars().next().is_some_and(char::is_uppercase)
                && word
                    .chars()
                    .all(|c| c.is_alphabetic() || matches!(c, '\'' | '-' | '.'))
        })
}

pub fn looks_like_role(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.len() <= 80
        && lowered
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .any(|word| ROLE_KEYWORDS.contains(&word))
}

#[cfg(test)]
mod tests {
    use super::{extract_company_name, extract_team_member, looks_like_person_name, HtmlTag};
    use crate::domain::business::TeamMember;

    #[test]
    fn company_name_from_title() {
        let tag = HtmlTag::TitleTag("Acme Digital | Growth Marketing Agency NYC".to_string());
        assert_eq!(extract_company_name(&tag), Some("Acme Digital".to_string()));

        let tag = HtmlTag::TitleTag("Globex".to_string());
        assert_eq!(extract_company_name(&tag), Some("Globex".to_string()));

        let tag = HtmlTag::TitleTag("   ".to_string());
        assert_eq!(extract_company_name(&tag), None);
    }

    #[test]
    fn team_member_from_two_line_card() {
        let tag = HtmlTag::TeamCardTag("\n  Jane Doe \n Founder & CEO\n Loves coffee".to_string());
        assert_eq!(
            extract_team_member(&tag),
            Some(TeamMember::new("Jane Doe", "Founder & CEO"))
        );
    }

    #[test]
    fn team_member_from_separator() {
        let tag = HtmlTag::HeadingTag("John Smith - Creative Director".to_string());
        assert_eq!(
            extract_team_member(&tag),
            Some(TeamMember::new("John Smith", "Creative Director"))
        );

        let tag = HtmlTag::HeadingTag("Our Services - What We Do".to_string());
        assert_eq!(extract_team_member(&tag), None);
    }

    #[test]
    fn person_name_heuristics() {
        assert!(looks_like_person_name("Mary-Jane O'Neil"));
        assert!(looks_like_person_name("Dr. Ada Lovelace"));
        assert!(!looks_like_person_name("Contact"));
        assert!(!looks_like_person_name("Managing Director"));
        assert!(!looks_like_person_name("we build brands"));
    }
}
