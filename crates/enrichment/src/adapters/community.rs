//! Social discussion sources: Reddit search and Hacker News (Algolia) search

use super::{EntityQuery, SourceAdapter, SourcePayload, SourceRecord};
use crate::bundle::{CommunitySnapshot, UgcPost};
use crate::fetch::{build_url, FetchExecutor};
use crate::sentiment;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use peptrack_common::config::SourcesConfig;
use peptrack_common::EvidenceSource;
use regex_lite::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument, warn};

/// Fields of a post before scoring
struct RawPost {
    title: String,
    body: String,
    author: Option<String>,
    url: String,
    created_at: Option<DateTime<Utc>>,
    score: i64,
}

/// Search terms plus the vendor domain, if any
fn match_terms(query: &EntityQuery) -> Vec<String> {
    let mut terms = query.terms();
    if let Some(domain) = query.domain.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        terms.push(domain.to_string());
    }
    terms
}

/// Score a post; posts that never mention any term are discarded
fn score_post(platform: EvidenceSource, raw: RawPost, terms: &[String]) -> Option<UgcPost> {
    let haystack = format!("{} {}", raw.title, raw.body).to_lowercase();
    let matched_term = terms
        .iter()
        .find(|t| haystack.contains(&t.to_lowercase()))?
        .clone();

    let sentiment = sentiment::score(&format!("{} {}", raw.title, raw.body));
    let quote = sentiment::extract_quote(&raw.title, &raw.body, &matched_term);

    Some(UgcPost {
        platform,
        title: raw.title,
        author: raw.author.filter(|a| !a.is_empty() && a != "[deleted]"),
        url: raw.url,
        created_at: raw.created_at,
        score: raw.score,
        matched_term,
        quote,
        sentiment,
    })
}

/// One post per URL keeping its highest score, highest-voted first, ties by URL,
/// capped at `limit`
fn into_snapshot(
    platform: EvidenceSource,
    raw: Vec<RawPost>,
    terms: &[String],
    limit: usize,
) -> CommunitySnapshot {
    let mut posts: Vec<UgcPost> = raw
        .into_iter()
        .filter_map(|p| score_post(platform, p, terms))
        .collect();
    posts.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.url.cmp(&b.url)));
    let mut seen = HashSet::new();
    posts.retain(|p| seen.insert(p.url.clone()));
    posts.truncate(limit);
    CommunitySnapshot {
        source: platform,
        posts,
    }
}

fn community_record(
    source: EvidenceSource,
    query_url: String,
    citation_url: Option<String>,
    snapshot: CommunitySnapshot,
) -> SourceRecord {
    debug!(posts = snapshot.posts.len(), "Community posts scored");
    SourceRecord {
        source,
        query_url: Some(query_url),
        citation_url,
        payload: SourcePayload::Community(snapshot),
    }
}

// Reddit

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RedditListing {
    data: RedditListingData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RedditListingData {
    children: Vec<RedditChild>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RedditChild {
    data: RedditPost,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RedditPost {
    title: String,
    selftext: String,
    author: Option<String>,
    created_utc: Option<f64>,
    score: i64,
    permalink: Option<String>,
}

fn reddit_posts(listing: RedditListing) -> Vec<RawPost> {
    listing
        .data
        .children
        .into_iter()
        .filter_map(|child| {
            let post = child.data;
            let permalink = post.permalink?;
            Some(RawPost {
                title: post.title,
                body: post.selftext,
                author: post.author,
                url: format!("https://www.reddit.com{}", permalink),
                created_at: post
                    .created_utc
                    .and_then(|ts| DateTime::from_timestamp(ts as i64, 0)),
                score: post.score,
            })
        })
        .collect()
}

pub struct RedditAdapter {
    executor: Arc<FetchExecutor>,
    base: String,
    limit: u32,
}

impl RedditAdapter {
    pub fn new(executor: Arc<FetchExecutor>, sources: &SourcesConfig) -> Self {
        Self {
            executor,
            base: sources.reddit_base.clone(),
            limit: sources.community_post_limit,
        }
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::Reddit
    }

    #[instrument(skip(self, query), fields(slug = %query.slug, source = "reddit"))]
    async fn query(&self, query: &EntityQuery) -> SourceRecord {
        let term = query.primary_term();
        let limit = self.limit.to_string();
        let url = match build_url(
            &self.base,
            &["search.json"],
            &[
                ("q", term.as_str()),
                ("sort", "relevance"),
                ("limit", limit.as_str()),
                ("t", "year"),
            ],
        ) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Bad discussion search URL");
                return SourceRecord::empty(self.source());
            }
        };
        let query_url = url.to_string();

        match self.executor.fetch_json::<RedditListing>(url).await {
            Ok(listing) => {
                let snapshot = into_snapshot(
                    self.source(),
                    reddit_posts(listing),
                    &match_terms(query),
                    self.limit as usize,
                );
                let citation_url = build_url("https://www.reddit.com/search/", &[], &[("q", term.as_str())])
                    .ok()
                    .map(|u| u.to_string());
                community_record(self.source(), query_url, citation_url, snapshot)
            }
            Err(e) => {
                warn!(error = %e, "Discussion search unavailable");
                SourceRecord::absent(self.source(), Some(query_url))
            }
        }
    }
}

// Hacker News

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HnSearch {
    hits: Vec<HnHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HnHit {
    title: Option<String>,
    story_title: Option<String>,
    comment_text: Option<String>,
    story_text: Option<String>,
    author: Option<String>,
    created_at_i: Option<i64>,
    points: Option<i64>,
    #[serde(rename = "objectID")]
    object_id: Option<String>,
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static pattern"))
}

/// Drop markup from Algolia's HTML fragments
fn strip_html(html: &str) -> String {
    let text = html.replace("<p>", "\n");
    tag_re()
        .replace_all(&text, " ")
        .replace("&#x27;", "'")
        .replace("&#x2F;", "/")
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

fn hn_posts(search: HnSearch) -> Vec<RawPost> {
    search
        .hits
        .into_iter()
        .filter_map(|hit| {
            let id = hit.object_id?;
            let body = hit
                .comment_text
                .or(hit.story_text)
                .map(|t| strip_html(&t))
                .unwrap_or_default();
            Some(RawPost {
                title: hit.title.or(hit.story_title).unwrap_or_default(),
                body,
                author: hit.author,
                url: format!("https://news.ycombinator.com/item?id={}", id),
                created_at: hit.created_at_i.and_then(|ts| DateTime::from_timestamp(ts, 0)),
                score: hit.points.unwrap_or(0),
            })
        })
        .collect()
}

pub struct HackerNewsAdapter {
    executor: Arc<FetchExecutor>,
    base: String,
    limit: u32,
}

impl HackerNewsAdapter {
    pub fn new(executor: Arc<FetchExecutor>, sources: &SourcesConfig) -> Self {
        Self {
            executor,
            base: sources.hackernews_base.clone(),
            limit: sources.community_post_limit,
        }
    }
}

#[async_trait]
impl SourceAdapter for HackerNewsAdapter {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::HackerNews
    }

    #[instrument(skip(self, query), fields(slug = %query.slug, source = "hackernews"))]
    async fn query(&self, query: &EntityQuery) -> SourceRecord {
        let term = query.primary_term();
        let limit = self.limit.to_string();
        let url = match build_url(
            &self.base,
            &["search"],
            &[
                ("query", term.as_str()),
                ("tags", "(story,comment)"),
                ("hitsPerPage", limit.as_str()),
            ],
        ) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Bad discussion search URL");
                return SourceRecord::empty(self.source());
            }
        };
        let query_url = url.to_string();

        match self.executor.fetch_json::<HnSearch>(url).await {
            Ok(search) => {
                let snapshot = into_snapshot(
                    self.source(),
                    hn_posts(search),
                    &match_terms(query),
                    self.limit as usize,
                );
                let citation_url = build_url("https://hn.algolia.com/", &[], &[("q", term.as_str())])
                    .ok()
                    .map(|u| u.to_string());
                community_record(self.source(), query_url, citation_url, snapshot)
            }
            Err(e) => {
                warn!(error = %e, "Discussion search unavailable");
                SourceRecord::absent(self.source(), Some(query_url))
            }
        }
    }
}
