//! Capture an HTML file, stdin or URL into a self-contained document.
//!
//! ```text
//! collect-capture <FILE|URL|-> [--base URL] [--cookie HEADER] [--json]
//!                 [--output PATH] [--save] [--endpoint URL]
//! ```
//!
//! Local input (a file or `-` for stdin) needs `--base`: relative references
//! can only be inlined or made absolute against the http(s) URL the page
//! came from.

use std::env;
use std::error::Error;
use std::fs;
use std::io::{self, Read, Write};

use collect_capture::client::DEFAULT_ENDPOINT;
use collect_capture::{
    capture_with_stats, FetchConfig, Fetcher, HttpFetcher, Options, SaveRequest, StaticPage, StorageClient,
};
use log::info;
use url::Url;

const USAGE: &str = "usage: collect-capture <FILE|URL|-> [--base URL] [--cookie HEADER] [--json] [--output PATH] [--save] [--endpoint URL]";

#[derive(Debug, Default)]
struct Args {
    input: String,
    base: Option<String>,
    cookie: Option<String>,
    json: bool,
    output: Option<String>,
    save: bool,
    endpoint: Option<String>,
}

fn parse_args(mut it: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut args = Args::default();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--base" => args.base = Some(it.next().ok_or("--base needs a URL")?),
            "--cookie" => args.cookie = Some(it.next().ok_or("--cookie needs a value")?),
            "--output" | "-o" => args.output = Some(it.next().ok_or("--output needs a path")?),
            "--json" => args.json = true,
            "--endpoint" => args.endpoint = Some(it.next().ok_or("--endpoint needs a URL")?),
            "--save" => args.save = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            other if args.input.is_empty() => args.input = other.to_string(),
            other => return Err(format!("unexpected argument {other}\n{USAGE}")),
        }
    }
    if args.input.is_empty() {
        return Err(USAGE.to_string());
    }
    Ok(args)
}

/// URL relative references are resolved against: `--base`, else the remote
/// input itself. Both must be http(s).
fn resolve_page_url(args: &Args, remote: Option<&Url>) -> Result<String, String> {
    let Some(base) = &args.base else {
        return remote
            .map(Url::to_string)
            .ok_or_else(|| format!("{} is local input, pass --base with the page's URL\n{USAGE}", args.input));
    };
    let url = Url::parse(base).map_err(|e| format!("invalid --base {base}: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("--base must be an http(s) URL, got {base}"));
    }
    Ok(url.to_string())
}

fn exit_usage(msg: &str) -> ! {
    eprintln!("{msg}");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args = parse_args(env::args().skip(1)).unwrap_or_else(|msg| exit_usage(&msg));
    let remote = Url::parse(&args.input)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"));
    let page_url = resolve_page_url(&args, remote.as_ref()).unwrap_or_else(|msg| exit_usage(&msg));

    let fetcher = HttpFetcher::new(&FetchConfig {
        cookie: args.cookie.clone(),
        referer: Some(page_url.clone()),
        ..FetchConfig::default()
    })?;

    let bytes = match &remote {
        Some(url) => fetcher.fetch(url).await?.bytes,
        None if args.input == "-" => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            buf
        }
        None => fs::read(&args.input)?,
    };

    let mut page = StaticPage::from_bytes(&bytes, &page_url)?;
    let (result, stats) = capture_with_stats(&mut page, &fetcher, &Options::default()).await?;
    info!(
        "{} resources inlined, {} fell back",
        stats.inlined, stats.fetch_failures
    );

    if args.save {
        let client = StorageClient::new(args.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT))?;
        let id = client
            .save(&SaveRequest::from_capture(page_url.clone(), result.clone()))
            .await?;
        eprintln!("saved as {id}");
    }

    let rendered = if args.json {
        serde_json::to_string_pretty(&result)?
    } else {
        result.html
    };
    match &args.output {
        Some(path) => fs::write(path, rendered)?,
        None => io::stdout().write_all(rendered.as_bytes())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn parses_flags_and_input() {
        let parsed = args(&["page.html", "--base", "https://example.com/p", "--json", "--save"]).expect("valid");
        assert_eq!(parsed.input, "page.html");
        assert_eq!(parsed.base.as_deref(), Some("https://example.com/p"));
        assert!(parsed.json && parsed.save);
        assert!(args(&[]).is_err());
        assert!(args(&["a.html", "b.html"]).is_err());
        assert!(args(&["a.html", "--base"]).is_err());
    }

    #[test]
    fn local_input_requires_an_http_base() {
        let stdin = args(&["-"]).expect("valid");
        assert!(resolve_page_url(&stdin, None).is_err());

        let file = args(&["saved/page.html"]).expect("valid");
        assert!(resolve_page_url(&file, None).is_err());

        let file_base = args(&["saved/page.html", "--base", "file:///tmp/saved/"]).expect("valid");
        assert!(resolve_page_url(&file_base, None).is_err());

        let based = args(&["-", "--base", "https://example.com/t/1"]).expect("valid");
        assert_eq!(resolve_page_url(&based, None).as_deref(), Ok("https://example.com/t/1"));
    }

    #[test]
    fn remote_input_is_its_own_base() {
        let remote = Url::parse("https://example.com/a?b=1").expect("valid");
        let parsed = args(&["https://example.com/a?b=1"]).expect("valid");
        assert_eq!(resolve_page_url(&parsed, Some(&remote)).as_deref(), Ok("https://example.com/a?b=1"));
    }
}
