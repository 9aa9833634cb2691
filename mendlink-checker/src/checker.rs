use crate::correct::{CorrectionKind, Corrector};
use crate::error::Result;
use crate::page::Page;
use crate::probe::{LinkValidator, ProbeOutcome};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// One applied correction, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct CorrectedLink {
    pub page: Option<PathBuf>,
    pub original: String,
    pub new_url: String,
    pub kind: CorrectionKind,
}

/// Summary of one scan cycle, from cache clear through settlement of every
/// probe chain.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: String,
    pub started_at: String,
    pub duration_ms: u128,
    pub pages: usize,
    pub anchors: usize,
    pub distinct_urls: usize,
    pub healthy: usize,
    pub broken: usize,
    pub skipped: usize,
    pub corrections: Vec<CorrectedLink>,
}

/// Runs full scan cycles over an exported site directory: scan anchors,
/// fan out probes, correct exhausted links, write mutated pages back.
pub struct SiteChecker {
    validator: LinkValidator,
    corrector: Corrector,
    concurrency: usize,
    dry_run: bool,
}

impl SiteChecker {
    pub fn new() -> Self {
        Self {
            validator: LinkValidator::new(),
            corrector: Corrector::new(),
            concurrency: 32,
            dry_run: false,
        }
    }

    pub fn with_validator(mut self, validator: LinkValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_corrector(mut self, corrector: Corrector) -> Self {
        self.corrector = corrector;
        self
    }

    /// Upper bound on simultaneous probe chains. Keeps a link-heavy site
    /// from opening one connection per anchor all at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Probe and report but leave the files on disk untouched.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run one scan cycle over the exported site at `dir`.
    pub async fn run_cycle(&self, dir: &Path) -> Result<CycleReport> {
        let started = Instant::now();
        let started_at = Utc::now().to_rfc3339();
        let cycle_id = Uuid::new_v4().to_string();

        // Cycle boundary: previously checked URLs are forgotten.
        self.validator.clear_checked().await;

        let mut pages = Page::load_site(dir)?;
        let anchors: usize = pages.iter().map(|p| p.anchors().len()).sum();
        info!(
            cycle = %cycle_id,
            "Scanning {} pages / {} anchors under {}",
            pages.len(),
            anchors,
            dir.display()
        );

        // Distinct URLs in first-seen order; each is probed exactly once.
        let mut seen = std::collections::HashSet::new();
        let mut urls = Vec::new();
        for page in &pages {
            for anchor in page.anchors() {
                if seen.insert(anchor.href.clone()) {
                    urls.push(anchor.href.clone());
                }
            }
        }

        // Bounded fan-out; collecting waits for every probe chain to
        // settle, retries included, regardless of individual outcomes.
        let outcomes: HashMap<String, ProbeOutcome> = stream::iter(urls.iter().cloned())
            .map(|url| async move {
                let outcome = self.validator.validate(&url).await;
                (url, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let healthy = outcomes.values().filter(|o| o.is_healthy()).count();
        let skipped = outcomes
            .values()
            .filter(|o| matches!(o, ProbeOutcome::Skipped))
            .count();

        // Correction is per element: every anchor referencing a broken URL
        // is individually rewritten.
        let mut corrections = Vec::new();
        for page in &mut pages {
            let path = page.path().map(Path::to_path_buf);
            for anchor in page.anchors_mut() {
                let broken = outcomes.get(&anchor.href).is_some_and(|o| o.is_broken());
                if broken {
                    let original = anchor.href.clone();
                    let correction = self.corrector.correct(anchor);
                    corrections.push(CorrectedLink {
                        page: path.clone(),
                        original,
                        new_url: correction.new_url,
                        kind: correction.kind,
                    });
                }
            }
            if page.is_dirty() {
                if self.dry_run {
                    debug!(
                        "Dry run, not writing {} ({} corrections)",
                        page.path().map(|p| p.display().to_string()).unwrap_or_default(),
                        page.corrected_count()
                    );
                } else {
                    page.write_back()?;
                }
            }
        }

        let report = CycleReport {
            cycle_id,
            started_at,
            duration_ms: started.elapsed().as_millis(),
            pages: pages.len(),
            anchors,
            distinct_urls: urls.len(),
            healthy,
            broken: outcomes.values().filter(|o| o.is_broken()).count(),
            skipped,
            corrections,
        };
        info!(
            cycle = %report.cycle_id,
            "Cycle complete: {} healthy, {} broken, {} skipped, {} corrections",
            report.healthy,
            report.broken,
            report.skipped,
            report.corrections.len()
        );
        Ok(report)
    }
}

impl Default for SiteChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn checker_for(server_host: Option<String>) -> SiteChecker {
        SiteChecker::new().with_validator(
            LinkValidator::new()
                .with_retry_delay(Duration::from_millis(1))
                .with_base_host(server_host),
        )
    }

    fn write_page(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("<html><head></head><body>{}</body></html>", body))
            .unwrap();
        path
    }

    #[tokio::test]
    async fn broken_link_is_corrected_on_disk() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let host = url::Url::parse(&server.uri()).unwrap();
        let page_path = write_page(
            dir.path(),
            "index.html",
            &format!(r#"<a href="{}/old">Old</a>"#, server.uri()),
        );

        let checker = checker_for(host.host_str().map(String::from));
        let report = checker.run_cycle(dir.path()).await.unwrap();

        assert_eq!(report.broken, 1);
        assert_eq!(report.corrections.len(), 1);
        // http://127.0.0.1:PORT/old matches the https-upgrade pattern
        assert!(report.corrections[0].new_url.starts_with("https://"));

        let rewritten = std::fs::read_to_string(&page_path).unwrap();
        assert!(rewritten.contains("data-original-url"));
        assert!(rewritten.contains("mendlink-corrected"));
    }

    #[tokio::test]
    async fn shared_url_across_pages_is_probed_once() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let link = format!(r#"<a href="{}/shared">x</a>"#, server.uri());
        write_page(dir.path(), "a.html", &link);
        write_page(dir.path(), "b.html", &format!("{}{}", link, link));

        let checker = checker_for(None);
        let report = checker.run_cycle(dir.path()).await.unwrap();
        assert_eq!(report.anchors, 3);
        assert_eq!(report.distinct_urls, 1);
        assert_eq!(report.healthy, 1);
    }

    #[tokio::test]
    async fn every_element_sharing_a_broken_url_is_rewritten() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let host = url::Url::parse(&server.uri()).unwrap();
        let link = format!(r#"<a href="{}/dead">x</a>"#, server.uri());
        let page_path = write_page(dir.path(), "index.html", &format!("{} {}", link, link));

        let checker = checker_for(host.host_str().map(String::from));
        let report = checker.run_cycle(dir.path()).await.unwrap();

        assert_eq!(report.distinct_urls, 1);
        assert_eq!(report.corrections.len(), 2);
        let rewritten = std::fs::read_to_string(&page_path).unwrap();
        assert_eq!(rewritten.matches("data-original-url").count(), 2);
    }

    #[tokio::test]
    async fn non_http_links_are_never_mutated() {
        let dir = tempfile::tempdir().unwrap();
        let page_path = write_page(
            dir.path(),
            "index.html",
            r#"<a href="ftp://x">f</a><a href="/about">a</a>"#,
        );
        let before = std::fs::read_to_string(&page_path).unwrap();

        let checker = checker_for(None);
        let report = checker.run_cycle(dir.path()).await.unwrap();

        assert_eq!(report.skipped, 2);
        assert_eq!(report.broken, 0);
        assert_eq!(std::fs::read_to_string(&page_path).unwrap(), before);
    }

    #[tokio::test]
    async fn dry_run_reports_but_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let page_path = write_page(
            dir.path(),
            "index.html",
            r#"<a href="http://127.0.0.1:9/x">x</a>"#,
        );
        let before = std::fs::read_to_string(&page_path).unwrap();

        let checker = SiteChecker::new()
            .with_dry_run(true)
            .with_validator(
                LinkValidator::new()
                    .with_retry_delay(Duration::from_millis(1))
                    .with_timeout(Duration::from_millis(200)),
            );
        let report = checker.run_cycle(dir.path()).await.unwrap();

        assert_eq!(report.corrections.len(), 1);
        assert_eq!(std::fs::read_to_string(&page_path).unwrap(), before);
    }
}
