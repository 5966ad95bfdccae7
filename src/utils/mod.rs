//! Utility functions and helpers.

pub mod http;
pub mod log;

use url::Url;

use crate::error::{AppError, Result};
use crate::models::{EntryType, RegistrationRange};

/// Render a result URL template for one registration number.
///
/// Supported placeholders:
/// - `{reg_no}`, `{semester}`, `{sem_ordinal}`, `{sem_roman}`
/// - `{batch}`, `{exam_year}`, `{branch}`, `{college}`
pub fn render_url(template: &str, range: &RegistrationRange, reg_no: u64) -> String {
    template
        .replace("{reg_no}", &reg_no.to_string())
        .replace("{semester}", &range.semester.to_string())
        .replace("{sem_ordinal}", range.sem_ordinal())
        .replace("{sem_roman}", range.sem_roman())
        .replace("{batch}", &range.batch.to_string())
        .replace("{exam_year}", &range.exam_year().to_string())
        .replace("{branch}", &range.branch)
        .replace("{college}", &range.college)
}

/// Render every candidate for a registration number, in preference order.
pub fn candidate_urls(templates: &[String], range: &RegistrationRange, reg_no: u64) -> Vec<String> {
    templates
        .iter()
        .map(|t| render_url(t, range, reg_no))
        .collect()
}

/// Check that every template renders to an absolute http(s) URL.
pub fn validate_templates(templates: &[String], range: &RegistrationRange) -> Result<()> {
    let probe = range.registration_number(range.start, EntryType::Regular);
    for template in templates {
        let rendered = render_url(template, range, probe);
        let url = Url::parse(&rendered).map_err(|e| {
            AppError::invalid_range(format!("URL template does not render to a URL ({e}): {template}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::invalid_range(format!(
                "URL template must be http(s): {template}"
            )));
        }
        if rendered.contains('{') || rendered.contains('}') {
            return Err(AppError::invalid_range(format!(
                "URL template has an unknown placeholder: {template}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceConfig;

    fn range() -> RegistrationRange {
        RegistrationRange::new(1, 10, 3, 24, "105", "107")
    }

    #[test]
    fn test_render_default_templates() {
        let urls = candidate_urls(&SourceConfig::default().url_templates, &range(), 24105107012);
        assert_eq!(
            urls[0],
            "https://results.beup.ac.in/ResultsBTech3rdSem2025_B2024Pub.aspx?Sem=III&RegNo=24105107012"
        );
        assert_eq!(
            urls[1],
            "https://results.beup.ac.in/ResultsBTech3rdSem2025Pub.aspx?Sem=III&RegNo=24105107012"
        );
    }

    #[test]
    fn test_validate_templates() {
        assert!(validate_templates(&SourceConfig::default().url_templates, &range()).is_ok());
        assert!(validate_templates(&["ftp://example.com/{reg_no}".into()], &range()).is_err());
        assert!(
            validate_templates(&["https://example.com/{reg_no}/{term}".into()], &range()).is_err()
        );
        assert!(matches!(
            validate_templates(&["not a url {reg_no}".into()], &range()),
            Err(AppError::InvalidRangeConfig(_))
        ));
    }
}
