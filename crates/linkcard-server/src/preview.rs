//! Link previews: fetch a page and pull its title, description and image
//! out of the OpenGraph tags, falling back to `<title>` and
//! `<meta name="description">`.
//!
//! A preview never fails from the caller's point of view; anything that
//! goes wrong yields an all-empty [`LinkPreview`].
//!
//! Only public addresses are fetched.  Literal IPs are checked on the
//! initial URL and on every redirect hop; hostnames go through a resolver
//! that drops loopback, private and link-local results, so a name cannot
//! be re-pointed at an internal host between check and connect.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::{redirect, Client};
use serde::Serialize;
use tracing::debug;
use url::{Host, Url};

/// Only the head of a page matters; stop reading after this many bytes.
const MAX_PREVIEW_BODY: usize = 1024 * 1024;

const MAX_REDIRECTS: usize = 5;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkPreview {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

pub struct PreviewFetcher {
    client: Client,
}

impl PreviewFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect_policy())
            .dns_resolver(Arc::new(PublicOnlyResolver))
            // A proxy would be resolved instead of the target.
            .no_proxy()
            .user_agent(concat!("linkcard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, raw_url: &str) -> LinkPreview {
        match self.try_fetch(raw_url).await {
            Ok(preview) => preview,
            Err(e) => {
                debug!(url = %raw_url, error = %e, "preview fetch failed");
                LinkPreview::default()
            }
        }
    }

    async fn try_fetch(&self, raw_url: &str) -> anyhow::Result<LinkPreview> {
        let url = Url::parse(raw_url.trim())?;
        if let Err(reason) = check_target(&url) {
            anyhow::bail!("{reason}: {url}");
        }

        let mut resp = self.client.get(url).send().await?.error_for_status()?;
        let base = resp.url().clone();

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() >= MAX_PREVIEW_BODY {
                body.truncate(MAX_PREVIEW_BODY);
                break;
            }
        }

        let html = String::from_utf8_lossy(&body);
        Ok(parse_preview(&html, Some(&base)))
    }
}

/// Scheme and literal-address check applied to every URL we request.
fn check_target(url: &Url) -> Result<(), &'static str> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err("unsupported scheme");
    }
    match url.host() {
        None => Err("missing host"),
        Some(Host::Ipv4(ip)) if !is_public_ip(IpAddr::V4(ip)) => Err("non-public address"),
        Some(Host::Ipv6(ip)) if !is_public_ip(IpAddr::V6(ip)) => Err("non-public address"),
        Some(_) => Ok(()),
    }
}

fn redirect_policy() -> redirect::Policy {
    redirect::Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let verdict = check_target(attempt.url());
        match verdict {
            Ok(()) => attempt.follow(),
            Err(reason) => attempt.error(reason),
        }
    })
}

/// DNS resolver that only hands out public addresses.
struct PublicOnlyResolver;

impl Resolve for PublicOnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(resolve_public(name.as_str().to_string()))
    }
}

async fn resolve_public(host: String) -> Result<Addrs, BoxError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
        .await?
        .filter(|addr| is_public_ip(addr.ip()))
        .collect();
    if addrs.is_empty() {
        return Err(format!("{host} has no public address").into());
    }
    Ok(Box::new(addrs.into_iter()))
}

pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    let reserved = a == 0
        || a >= 240
        // 100.64.0.0/10, carrier-grade NAT
        || (a == 100 && (b & 0xc0) == 64)
        || (a == 192 && b == 0 && c == 0);
    !(reserved
        || ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
        || ip.is_documentation())
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let [first, second, ..] = ip.segments();
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    let documentation = first == 0x2001 && second == 0x0db8;
    !(ip.is_loopback() || ip.is_unspecified() || ip.is_multicast())
        && !(unique_local || link_local || documentation)
}

lazy_static! {
    static ref META_TAG: Regex = Regex::new(r"(?is)<meta\b[^>]*>").unwrap();
    static ref ATTRIBUTE: Regex =
        Regex::new(r#"(?is)([a-z:_-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
    static ref TITLE_TAG: Regex = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap();
}

/// Extract a preview from an HTML document.  Relative image URLs are
/// resolved against `base` when one is given.
pub fn parse_preview(html: &str, base: Option<&Url>) -> LinkPreview {
    let mut meta: HashMap<String, String> = HashMap::new();
    for tag in META_TAG.find_iter(html) {
        let mut key = None;
        let mut content = None;
        for cap in ATTRIBUTE.captures_iter(tag.as_str()) {
            let name = cap[1].to_ascii_lowercase();
            let value = cap.get(2).or_else(|| cap.get(3)).map_or("", |m| m.as_str());
            match name.as_str() {
                "property" | "name" => key = Some(value.to_ascii_lowercase()),
                "content" => content = Some(decode_entities(value)),
                _ => {}
            }
        }
        if let (Some(key), Some(content)) = (key, content) {
            meta.entry(key).or_insert(content);
        }
    }

    let pick = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| meta.get(*k))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
            .map(str::to_string)
    };

    let title = pick(&["og:title", "twitter:title"]).or_else(|| {
        TITLE_TAG
            .captures(html)
            .map(|c| decode_entities(c[1].trim()))
            .filter(|t| !t.is_empty())
    });
    let description = pick(&["og:description", "description", "twitter:description"]);
    let image = pick(&["og:image", "og:image:url", "twitter:image"]).map(|src| match base {
        Some(base) => base.join(&src).map(String::from).unwrap_or(src),
        None => src,
    });

    LinkPreview {
        title,
        description,
        image,
    }
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
