use crate::page::Anchor;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Which rewrite produced the replacement URL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CorrectionKind {
    HttpsUpgrade,
    WwwRemoval,
    GithubPages,
    Fallback,
}

impl CorrectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionKind::HttpsUpgrade => "https-upgrade",
            CorrectionKind::WwwRemoval => "www-removal",
            CorrectionKind::GithubPages => "github-pages",
            CorrectionKind::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correction {
    pub new_url: String,
    pub kind: CorrectionKind,
}

/// Rewrites exhausted links to a pattern-based alternative or the fixed
/// fallback path, and applies the one-shot mutation to the anchor.
pub struct Corrector {
    fallback_path: String,
    log_corrections: bool,
}

impl Corrector {
    pub fn new() -> Self {
        Self {
            fallback_path: "/404.html".to_string(),
            log_corrections: true,
        }
    }

    pub fn with_fallback_path(mut self, path: String) -> Self {
        self.fallback_path = path;
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.log_corrections = enabled;
        self
    }

    /// Classify a broken URL against the ordered rewrite patterns. The
    /// first pattern whose substring is present and whose substitution
    /// actually differs wins; otherwise the fallback path.
    pub fn rewrite(&self, url: &str) -> Correction {
        let patterns: [(&str, &str, CorrectionKind); 3] = [
            ("http://", "https://", CorrectionKind::HttpsUpgrade),
            ("www.", "", CorrectionKind::WwwRemoval),
            ("github.com", "github.io", CorrectionKind::GithubPages),
        ];

        for (needle, replacement, kind) in patterns {
            if url.contains(needle) {
                let candidate = url.replacen(needle, replacement, 1);
                if candidate != url {
                    return Correction {
                        new_url: candidate,
                        kind,
                    };
                }
            }
        }

        Correction {
            new_url: self.fallback_path.clone(),
            kind: CorrectionKind::Fallback,
        }
    }

    /// Rewrite one anchor in place: href, title, marker class,
    /// data-original-url and the inline notice. Non-reversible.
    pub fn correct(&self, anchor: &mut Anchor) -> Correction {
        let original = anchor.href.clone();
        let correction = self.rewrite(&original);
        anchor.rewrite(
            &correction.new_url,
            format!(
                "Original link: {} ({})",
                original,
                correction.kind.as_str()
            ),
        );
        if self.log_corrections {
            info!(
                original = %original,
                corrected = %correction.new_url,
                kind = correction.kind.as_str(),
                at = %Utc::now().to_rfc3339(),
                "Corrected broken link"
            );
        }
        correction
    }
}

impl Default for Corrector {
    fn default() -> Self {
        Self::new()
    }
}
