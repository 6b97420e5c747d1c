/// URL pattern registry
///
/// Maps post types to path templates and resolves public paths back to
/// (post_type, locale, slug). Templates use `:locale`, `:slug` and literal
/// segments; resolution tries the most specific pattern first.
use once_cell::sync::Lazy;

use crate::error::{AppError, Result};
use crate::models::Post;

/// One registered pattern
#[derive(Debug, Clone)]
pub struct UrlPattern {
    pub post_type: &'static str,
    pub template: &'static str,
}

/// Patterns ordered by number of literal segments, most specific first, so
/// `/:locale/articles/:slug` wins over `/:locale/:slug` for article paths.
static PATTERNS: Lazy<Vec<UrlPattern>> = Lazy::new(|| {
    let mut patterns = vec![
        UrlPattern {
            post_type: "page",
            template: "/:locale/:slug",
        },
        UrlPattern {
            post_type: "article",
            template: "/:locale/articles/:slug",
        },
        UrlPattern {
            post_type: "landing",
            template: "/:locale/l/:slug",
        },
    ];
    patterns.sort_by_key(|p| {
        std::cmp::Reverse(
            p.template
                .split('/')
                .filter(|s| !s.is_empty() && !s.starts_with(':'))
                .count(),
        )
    });
    patterns
});

/// Result of resolving a public path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub post_type: String,
    pub locale: String,
    pub slug: String,
}

fn template_for(post_type: &str) -> Result<&'static str> {
    PATTERNS
        .iter()
        .find(|p| p.post_type == post_type)
        .map(|p| p.template)
        .ok_or_else(|| {
            AppError::BadRequest(format!("no URL pattern registered for post type '{}'", post_type))
        })
}

/// Build the public path for a post from its type's template.
pub fn build_path(post: &Post) -> Result<String> {
    let template = template_for(&post.post_type)?;

    let path = template
        .split('/')
        .map(|segment| match segment {
            ":locale" => post.locale.as_str(),
            ":slug" => post.slug.as_str(),
            other => other,
        })
        .collect::<Vec<_>>()
        .join("/");

    Ok(path)
}

/// Resolve a public path to a post address.
///
/// Returns `None` when no registered pattern matches.
pub fn resolve_path(path: &str) -> Option<ResolvedPath> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for pattern in PATTERNS.iter() {
        let template_segments: Vec<&str> = pattern
            .template
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        if template_segments.len() != segments.len() {
            continue;
        }

        let mut locale = None;
        let mut slug = None;
        let mut matched = true;

        for (template_segment, segment) in template_segments.iter().zip(&segments) {
            match *template_segment {
                ":locale" => locale = Some(*segment),
                ":slug" => slug = Some(*segment),
                literal => {
                    if literal != *segment {
                        matched = false;
                        break;
                    }
                }
            }
        }

        if matched {
            if let (Some(locale), Some(slug)) = (locale, slug) {
                return Some(ResolvedPath {
                    post_type: pattern.post_type.to_string(),
                    locale: locale.to_string(),
                    slug: slug.to_string(),
                });
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_post(post_type: &str, locale: &str, slug: &str) -> Post {
        Post {
            id: Uuid::new_v4(),
            post_type: post_type.to_string(),
            locale: locale.to_string(),
            slug: slug.to_string(),
            title: "T".into(),
            status: "published".into(),
            translation_of_id: None,
            parent_id: None,
            order_index: 0,
            author_id: Uuid::new_v4(),
            excerpt: None,
            meta: serde_json::json!({}),
            scheduled_at: None,
            published_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_build_path_substitutes_placeholders() {
        let post = sample_post("article", "en", "launch-notes");
        assert_eq!(build_path(&post).unwrap(), "/en/articles/launch-notes");
    }

    #[test]
    fn test_build_path_unknown_type_is_an_error() {
        let post = sample_post("podcast", "en", "ep-1");
        assert!(build_path(&post).is_err());
    }

    #[test]
    fn test_resolve_prefers_most_specific_pattern() {
        let resolved = resolve_path("/en/articles/launch-notes").unwrap();
        assert_eq!(resolved.post_type, "article");
        assert_eq!(resolved.locale, "en");
        assert_eq!(resolved.slug, "launch-notes");
    }

    #[test]
    fn test_resolve_falls_back_to_page_pattern() {
        let resolved = resolve_path("/de/impressum").unwrap();
        assert_eq!(resolved.post_type, "page");
        assert_eq!(resolved.locale, "de");
        assert_eq!(resolved.slug, "impressum");
    }

    #[test]
    fn test_resolve_unknown_path_shape() {
        assert!(resolve_path("/en/articles/2024/launch").is_none());
        assert!(resolve_path("/").is_none());
    }

    #[test]
    fn test_build_and_resolve_round_trip() {
        let post = sample_post("landing", "fr", "printemps");
        let path = build_path(&post).unwrap();
        let resolved = resolve_path(&path).unwrap();
        assert_eq!(resolved.post_type, "landing");
        assert_eq!(resolved.locale, "fr");
        assert_eq!(resolved.slug, "printemps");
    }
}
