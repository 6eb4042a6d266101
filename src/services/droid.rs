use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::FutureExt;
use thirtyfour::{ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};
use url::Url;

use super::{
    page_parser::{parse_page, prioritized_links, PageData},
    website_scraper::{ExtractionStrategy, ScrapeOptions, StrategyKind},
};
use crate::{domain::business::BusinessProfile, error::ScrapeError};

/// A live browser. Must be closed by whoever launched it.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&self, url: &Url) -> Result<(), ScrapeError>;

    async fn page_source(&self) -> Result<String, ScrapeError>;

    async fn close(self: Box<Self>) -> Result<(), ScrapeError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScrapeError>;
}

pub struct Droid {
    pub driver: WebDriver,
}

#[async_trait]
impl BrowserSession for Droid {
    async fn goto(&self, url: &Url) -> Result<(), ScrapeError> {
        self.driver.goto(url.as_str()).await?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String, ScrapeError> {
        Ok(self.driver.source().await?)
    }

    async fn close(self: Box<Self>) -> Result<(), ScrapeError> {
        self.driver.quit().await?;
        Ok(())
    }
}

/// Opens chrome sessions on a remote WebDriver server.
pub struct DroidLauncher {
    webdriver_url: String,
    headless: bool,
}

impl DroidLauncher {
    pub fn new(webdriver_url: &str, headless: bool) -> Self {
        DroidLauncher {
            webdriver_url: webdriver_url.to_string(),
            headless,
        }
    }
}

#[async_trait]
impl BrowserLauncher for DroidLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScrapeError> {
        let mut caps = DesiredCapabilities::chrome();
        if self.headless {
            caps.set_headless()?;
        }
        caps.set_no_sandbox()?;
        caps.set_disable_dev_shm_usage()?;
        caps.add_arg("--window-size=1280,1024")?;
        // Pages only need the DOM
        caps.add_arg("--blink-settings=imagesEnabled=false")?;

        let driver = WebDriver::new(&self.webdriver_url, caps).await?;
        log::debug!("Connected to webdriver at {}", self.webdriver_url);

        Ok(Box::new(Droid { driver }))
    }
}

/// Renders the landing page and up to `max_pages` internal pages in one browser session.
pub struct BrowserStrategy {
    launcher: Arc<dyn BrowserLauncher>,
}

impl BrowserStrategy {
    pub fn new(launcher: Arc<dyn BrowserLauncher>) -> Self {
        BrowserStrategy { launcher }
    }
}

#[async_trait]
impl ExtractionStrategy for BrowserStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Browser
    }

    async fn extract(
        &self,
        url: &Url,
        options: &ScrapeOptions,
    ) -> Result<BusinessProfile, ScrapeError> {
        let session = tokio::time::timeout(options.navigation_timeout, self.launcher.launch())
            .await
            .map_err(|_| ScrapeError::Browser("browser launch timed out".to_string()))??;

        let crawled = AssertUnwindSafe(crawl_site(session.as_ref(), url, options))
            .catch_unwind()
            .await;

        match tokio::time::timeout(options.navigation_timeout, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Failed to close browser after {}: {}", url, e),
            Err(_) => log::warn!("Closing browser after {} timed out", url),
        }

        match crawled {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::Browser(format!(
                "page extraction panicked on {}",
                url
            ))),
        }
    }
}

async fn render(
    session: &dyn BrowserSession,
    url: &Url,
    timeout: Duration,
) -> Result<PageData, ScrapeError> {
    let html = tokio::time::timeout(timeout, async {
        session.goto(url).await?;
        session.page_source().await
    })
    .await
    .map_err(|_| ScrapeError::NavigationTimeout {
        url: url.to_string(),
    })??;

    Ok(parse_page(&html, url))
}

async fn crawl_site(
    session: &dyn BrowserSession,
    url: &Url,
    options: &ScrapeOptions,
) -> Result<BusinessProfile, ScrapeError> {
    let landing = render(session, url, options.navigation_timeout).await?;
    let links = prioritized_links(url, &landing.internal_links, options.max_pages);
    let mut profile = landing.into_profile(url);

    for link in links {
        match render(session, &link, options.navigation_timeout).await {
            Ok(page) => {
                log::debug!("Found {} team members on {}", page.team_members.len(), link);
                profile.merge_team_members(page.team_members);
                profile.merge_social_links(page.social_links);
                if profile.description.is_none() {
                    profile.description = page.description;
                }
            }
            Err(e) => log::warn!("Skipping internal page {}: {}", link, e),
        }
    }

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicU32, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use url::Url;

    use super::{BrowserLauncher, BrowserSession, BrowserStrategy};
    use crate::{
        domain::business::TeamMember,
        error::ScrapeError,
        services::website_scraper::{ExtractionStrategy, ScrapeOptions},
    };

    #[derive(Clone, Copy)]
    enum Behaviour {
        Render,
        NavigationError,
        Hang,
        Panic,
        HangLaunch,
        HangClose,
    }

    struct FakeSession {
        pages: Arc<HashMap<String, String>>,
        behaviour: Behaviour,
        current: Mutex<Option<String>>,
        visits: Arc<Mutex<Vec<String>>>,
        closes: Arc<AtomicU32>,
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn goto(&self, url: &Url) -> Result<(), ScrapeError> {
            self.visits.lock().unwrap().push(url.to_string());
            match self.behaviour {
                Behaviour::NavigationError => Err(ScrapeError::Browser("net::ERR".to_string())),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                _ => {
                    *self.current.lock().unwrap() = Some(url.to_string());
                    Ok(())
                }
            }
        }

        async fn page_source(&self) -> Result<String, ScrapeError> {
            if let Behaviour::Panic = self.behaviour {
                panic!("dom evaluation blew up");
            }
            let current = self.current.lock().unwrap().clone().unwrap_or_default();
            Ok(self.pages.get(&current).cloned().unwrap_or_default())
        }

        async fn close(self: Box<Self>) -> Result<(), ScrapeError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if let Behaviour::HangClose = self.behaviour {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(())
        }
    }

    struct FakeLauncher {
        pages: Arc<HashMap<String, String>>,
        behaviour: Behaviour,
        visits: Arc<Mutex<Vec<String>>>,
        closes: Arc<AtomicU32>,
    }

    impl FakeLauncher {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            let pages = HashMap::from([
                (
                    "https://acme.io/".to_string(),
                    r#"<title>Acme | Agency</title>
                       <h3>Jane Doe - CEO</h3>
                       <a href="/blog">Blog</a><a href="/team">Team</a><a href="/">Home</a>"#
                        .to_string(),
                ),
                (
                    "https://acme.io/team".to_string(),
                    r#"<h3>Jane Doe - Chief Executive Officer</h3><h3>John Smith - CTO</h3>"#
                        .to_string(),
                ),
            ]);
            Arc::new(FakeLauncher {
                pages: Arc::new(pages),
                behaviour,
                visits: Arc::new(Mutex::new(vec![])),
                closes: Arc::new(AtomicU32::new(0)),
            })
        }
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, ScrapeError> {
            if let Behaviour::HangLaunch = self.behaviour {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(Box::new(FakeSession {
                pages: self.pages.clone(),
                behaviour: self.behaviour,
                current: Mutex::new(None),
                visits: self.visits.clone(),
                closes: self.closes.clone(),
            }))
        }
    }

    fn options(max_pages: usize) -> ScrapeOptions {
        ScrapeOptions {
            use_firecrawl: false,
            max_pages,
            navigation_timeout: Duration::from_millis(50),
            ..ScrapeOptions::default()
        }
    }

    fn landing() -> Url {
        Url::parse("https://acme.io/").unwrap()
    }

    #[tokio::test]
    async fn follows_priority_links_and_merges_people() {
        let launcher = FakeLauncher::new(Behaviour::Render);
        let strategy = BrowserStrategy::new(launcher.clone());

        let profile = strategy.extract(&landing(), &options(1)).await.unwrap();

        assert_eq!(profile.name, "Acme");
        assert_eq!(
            profile.team_members,
            vec![TeamMember::new("Jane Doe", "CEO"), TeamMember::new("John Smith", "CTO")]
        );
        assert_eq!(
            *launcher.visits.lock().unwrap(),
            vec!["https://acme.io/", "https://acme.io/team"]
        );
        assert_eq!(launcher.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_max_pages_stays_on_landing() {
        let launcher = FakeLauncher::new(Behaviour::Render);
        let strategy = BrowserStrategy::new(launcher.clone());

        strategy.extract(&landing(), &options(0)).await.unwrap();

        assert_eq!(launcher.visits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn closes_once_on_every_exit_path() {
        for behaviour in [Behaviour::NavigationError, Behaviour::Hang, Behaviour::Panic] {
            let launcher = FakeLauncher::new(behaviour);
            let strategy = BrowserStrategy::new(launcher.clone());

            let result = strategy.extract(&landing(), &options(3)).await;

            assert!(result.is_err());
            assert_eq!(launcher.closes.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn navigation_timeout_is_reported() {
        let strategy = BrowserStrategy::new(FakeLauncher::new(Behaviour::Hang));

        let result = strategy.extract(&landing(), &options(0)).await;

        assert!(matches!(result, Err(ScrapeError::NavigationTimeout { .. })));
    }

    #[tokio::test]
    async fn stuck_launch_and_close_are_bounded() {
        let launcher = FakeLauncher::new(Behaviour::HangLaunch);
        let strategy = BrowserStrategy::new(launcher.clone());
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            strategy.extract(&landing(), &options(0)),
        )
        .await
        .expect("launch must be bounded");
        assert!(matches!(result, Err(ScrapeError::Browser(_))));
        assert!(launcher.visits.lock().unwrap().is_empty());

        let launcher = FakeLauncher::new(Behaviour::HangClose);
        let strategy = BrowserStrategy::new(launcher.clone());
        let profile = tokio::time::timeout(
            Duration::from_secs(5),
            strategy.extract(&landing(), &options(0)),
        )
        .await
        .expect("close must be bounded")
        .unwrap();
        assert_eq!(profile.name, "Acme");
        assert_eq!(launcher.closes.load(Ordering::SeqCst), 1);
    }
}
