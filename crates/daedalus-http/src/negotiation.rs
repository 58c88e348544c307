//! Content negotiation on `Accept` and `Accept-Language`.
//!
//! Each offer gets the quality of the most specific range matching it. The
//! offer with the highest non-zero quality wins; ties go to the offer listed
//! first. A missing header accepts everything.

use crate::exchange::HttpMeans;
use daedalus_core::{Context, Handler, Modification, StatusError};
use http::header::{HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, VARY};
use indexmap::IndexMap;
use std::sync::Arc;

/// Means naming the media type chosen by [`dispatch_by_accepted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedMediaType(pub String);

/// Means naming the language chosen by [`dispatch_by_language`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedLanguage(pub String);

/// One element of an `Accept`-style header.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityItem {
    /// The range, lowercased, without parameters.
    pub value: String,
    /// Quality in `0.0..=1.0`.
    pub quality: f32,
}

/// Parses a comma-separated header with optional `q` parameters.
///
/// Elements with an invalid quality are dropped.
pub fn parse_quality_list(header: &str) -> Vec<QualityItem> {
    header
        .split(',')
        .filter_map(|element| {
            let mut parts = element.split(';').map(str::trim);
            let value = parts.next().filter(|v| !v.is_empty())?.to_ascii_lowercase();

            let mut quality = 1.0;
            for param in parts {
                if let Some((name, raw)) = param.split_once('=') {
                    if name.trim().eq_ignore_ascii_case("q") {
                        quality = raw.trim().parse::<f32>().ok().filter(|q| (0.0..=1.0).contains(q))?;
                    }
                }
            }

            Some(QualityItem { value, quality })
        })
        .collect()
}

/// Specificity of a media range matching an offer, or `None`.
///
/// Wildcard offers such as `*/*` or `text/*` match any range they cover, at
/// the specificity of their own wildcard.
fn media_specificity(range: &str, offer: &str) -> Option<usize> {
    let (range_type, range_subtype) = range.split_once('/')?;
    let (offer_type, offer_subtype) = offer.split_once('/')?;

    if range_type == "*" || offer_type == "*" {
        return (range_subtype == "*" || offer_subtype == "*" || range_subtype == offer_subtype)
            .then_some(0);
    }
    if range_type != offer_type {
        return None;
    }
    if range_subtype == "*" || offer_subtype == "*" {
        return Some(1);
    }
    (range_subtype == offer_subtype).then_some(2)
}

/// Specificity of a language range matching a tag, or `None`.
///
/// An offer of `*` matches every range.
fn language_specificity(range: &str, tag: &str) -> Option<usize> {
    if range == "*" || tag == "*" {
        return Some(0);
    }
    if range == tag {
        return Some(range.len() + 1);
    }
    tag.strip_prefix(range)
        .filter(|rest| rest.starts_with('-'))
        .map(|_| range.len())
}

/// Returns the index of the preferred offer.
fn negotiate<'a>(
    ranges: &[QualityItem],
    offers: impl Iterator<Item = &'a str>,
    specificity: fn(&str, &str) -> Option<usize>,
) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;

    for (index, offer) in offers.enumerate() {
        let offer = offer
            .split(';')
            .next()
            .unwrap_or(offer)
            .trim()
            .to_ascii_lowercase();
        let quality = ranges
            .iter()
            .filter_map(|range| specificity(&range.value, &offer).map(|s| (s, range.quality)))
            .max_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)))
            .map_or(0.0, |(_, q)| q);

        if quality > 0.0 && best.map_or(true, |(_, q)| quality > q) {
            best = Some((index, quality));
        }
    }

    best.map(|(index, _)| index)
}

/// Returns the preferred media type among `offers` for an `Accept` value.
pub fn preferred_media_type<'a>(accept: Option<&str>, offers: &[&'a str]) -> Option<&'a str> {
    let ranges = parse_quality_list(accept.unwrap_or("*/*"));
    negotiate(&ranges, offers.iter().copied(), media_specificity).map(|i| offers[i])
}

/// Returns the preferred language among `offers` for an `Accept-Language` value.
pub fn preferred_language<'a>(accept_language: Option<&str>, offers: &[&'a str]) -> Option<&'a str> {
    let ranges = parse_quality_list(accept_language.unwrap_or("*"));
    negotiate(&ranges, offers.iter().copied(), language_specificity).map(|i| offers[i])
}

fn request_header(http: &HttpMeans, name: &HeaderName) -> Option<String> {
    let values: Vec<&str> = http
        .headers()
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .collect();

    (!values.is_empty()).then(|| values.join(","))
}

struct Negotiation {
    header: HeaderName,
    vary: &'static str,
    wildcard: &'static str,
    specificity: fn(&str, &str) -> Option<usize>,
}

static MEDIA_TYPE: Negotiation = Negotiation {
    header: ACCEPT,
    vary: "Accept",
    wildcard: "*/*",
    specificity: media_specificity,
};

static LANGUAGE: Negotiation = Negotiation {
    header: ACCEPT_LANGUAGE,
    vary: "Accept-Language",
    wildcard: "*",
    specificity: language_specificity,
};

fn dispatch_negotiated<S, M>(
    negotiation: &'static Negotiation,
    table: impl IntoIterator<Item = (S, Handler)>,
    means: M,
) -> Handler
where
    S: Into<String>,
    M: Fn(String) -> Modification + Send + Sync + 'static,
{
    let table: Arc<IndexMap<String, Handler>> =
        Arc::new(table.into_iter().map(|(k, h)| (k.into(), h)).collect());
    let means = Arc::new(means);

    Handler::new(move |ctx: Context| {
        let table = Arc::clone(&table);
        let means = Arc::clone(&means);
        async move {
            let http = ctx.require::<HttpMeans>()?;
            http.response()
                .append_header(VARY, HeaderValue::from_static(negotiation.vary));

            let header = request_header(http, &negotiation.header);
            let ranges =
                parse_quality_list(header.as_deref().unwrap_or(negotiation.wildcard));
            let chosen = negotiate(
                &ranges,
                table.keys().map(String::as_str),
                negotiation.specificity,
            );

            let Some((offer, handler)) = chosen.and_then(|i| table.get_index(i)) else {
                let offers: Vec<&str> = table.keys().map(String::as_str).collect();
                return Err(StatusError::not_acceptable()
                    .with_details(format!("Available: {}", offers.join(", ")))
                    .into());
            };

            ctx.next_with(handler, means(offer.clone())).await?;
            Ok(())
        }
    })
}

/// Dispatches to the handler of the media type preferred by `Accept`.
///
/// Adds `Vary: Accept` to the response, then delegates with
/// [`AcceptedMediaType`] in the means. Fails with 406 when no offer is
/// acceptable.
///
/// # Example
///
/// ```
/// use daedalus_core::Handler;
/// use daedalus_http::dispatch_by_accepted;
///
/// let page = dispatch_by_accepted([
///     ("application/json", Handler::noop()),
///     ("text/html", Handler::noop()),
/// ]);
/// ```
pub fn dispatch_by_accepted<S: Into<String>>(
    table: impl IntoIterator<Item = (S, Handler)>,
) -> Handler {
    dispatch_negotiated(&MEDIA_TYPE, table, |offer| {
        Modification::new().with(AcceptedMediaType(offer))
    })
}

/// Dispatches to the handler of the language preferred by `Accept-Language`.
///
/// Adds `Vary: Accept-Language`; fails with 406 when no offer is acceptable.
pub fn dispatch_by_language<S: Into<String>>(
    table: impl IntoIterator<Item = (S, Handler)>,
) -> Handler {
    dispatch_negotiated(&LANGUAGE, table, |offer| {
        Modification::new().with(AcceptedLanguage(offer))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROWSER: &str = "text/html,application/json;q=0.8,*/*;q=0.8";

    #[test]
    fn test_parse_quality_list() {
        let items = parse_quality_list("text/html, application/json;q=0.8 ,*/*; q=0.1");
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].value, "text/html");
        assert!((items[0].quality - 1.0).abs() < f32::EPSILON);
        assert!((items[1].quality - 0.8).abs() < f32::EPSILON);
        assert!((items[2].quality - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_drops_invalid_quality() {
        let items = parse_quality_list("text/html;q=2, text/plain;q=abc, application/json");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].value, "application/json");
    }

    #[test]
    fn test_browser_accept_prefers_html() {
        let chosen = preferred_media_type(Some(BROWSER), &["application/json", "text/html"]);
        assert_eq!(chosen, Some("text/html"));
    }

    #[test]
    fn test_missing_accept_takes_first_offer() {
        let chosen = preferred_media_type(None, &["application/json", "text/html"]);
        assert_eq!(chosen, Some("application/json"));
    }

    #[test]
    fn test_most_specific_range_wins() {
        let chosen = preferred_media_type(
            Some("text/*;q=0.5, text/plain;q=0, */*;q=0.1"),
            &["text/plain", "text/html", "image/png"],
        );
        assert_eq!(chosen, Some("text/html"));
    }

    #[test]
    fn test_nothing_acceptable() {
        let chosen = preferred_media_type(Some("image/png"), &["application/json"]);
        assert_eq!(chosen, None);
    }

    #[test]
    fn test_offer_parameters_ignored() {
        let chosen = preferred_media_type(
            Some("application/json"),
            &["application/json; charset=utf-8"],
        );
        assert_eq!(chosen, Some("application/json; charset=utf-8"));
    }

    #[test]
    fn test_language_prefix_match() {
        let chosen = preferred_language(Some("da, en;q=0.7"), &["en-GB", "fr"]);
        assert_eq!(chosen, Some("en-GB"));

        let chosen = preferred_language(Some("en-gb;q=0.9, en;q=0.5"), &["en-US", "en-GB"]);
        assert_eq!(chosen, Some("en-GB"));
    }

    #[test]
    fn test_wildcard_offer_is_catch_all() {
        let offers = ["text/html", "application/json", "*/*"];
        assert_eq!(preferred_media_type(Some("image/png"), &offers), Some("*/*"));
        assert_eq!(preferred_media_type(Some(BROWSER), &offers), Some("text/html"));
        assert_eq!(
            preferred_media_type(Some("application/json"), &offers),
            Some("application/json")
        );
    }

    #[test]
    fn test_type_wildcard_offer() {
        let offers = ["application/json", "image/*"];
        assert_eq!(preferred_media_type(Some("image/webp"), &offers), Some("image/*"));
        assert_eq!(preferred_media_type(Some("text/plain"), &offers), None);
    }

    #[test]
    fn test_wildcard_language_offer() {
        assert_eq!(preferred_language(Some("fr"), &["en", "*"]), Some("*"));
        assert_eq!(preferred_language(Some("en, fr;q=0.5"), &["en", "*"]), Some("en"));
    }

    #[test]
    fn test_language_prefix_requires_subtag_boundary() {
        assert_eq!(language_specificity("en", "eng"), None);
        assert_eq!(language_specificity("en", "en-us"), Some(2));
    }
}
