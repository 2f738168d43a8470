use anyhow::{Context, Result};
use ochat_ai::{DEFAULT_ENDPOINT, GenerateRequest, decode::parse_line};
use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

const DEFAULT_PROMPT: &str = "Say hello and then count to ten.";

// ── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct LoadTestOptions {
    url: String,
    requests: usize,
    concurrency: usize,
    prompts: Vec<String>,
    verbose: bool,
}

impl LoadTestOptions {
    fn parse(args: &[String]) -> Result<Self> {
        let mut url = format!("{DEFAULT_ENDPOINT}/stream");
        let mut requests = 1;
        let mut concurrency = 1;
        let mut prompt = None;
        let mut prompts_file = None;
        let mut verbose = false;

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = |name: &str| {
                iter.next()
                    .cloned()
                    .with_context(|| format!("{name} needs a value"))
            };
            match arg.as_str() {
                "--url" => url = value("--url")?,
                "-n" | "--requests" => {
                    requests = value("--requests")?
                        .parse()
                        .context("--requests must be a number")?
                }
                "-c" | "--concurrency" => {
                    concurrency = value("--concurrency")?
                        .parse()
                        .context("--concurrency must be a number")?
                }
                "--prompt" => prompt = Some(value("--prompt")?),
                "--prompts-file" => prompts_file = Some(value("--prompts-file")?),
                "-v" | "--verbose" => verbose = true,
                other => anyhow::bail!("Unknown option: {other}"),
            }
        }

        let prompts = match (prompts_file, prompt) {
            (Some(path), _) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {path}"))?;
                let prompts: Vec<String> = content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect();
                anyhow::ensure!(!prompts.is_empty(), "{path} has no prompts");
                prompts
            }
            (None, Some(prompt)) => vec![prompt],
            (None, None) => vec![DEFAULT_PROMPT.to_string()],
        };

        Ok(Self {
            url,
            requests,
            concurrency: concurrency.max(1),
            prompts,
            verbose,
        })
    }
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("load-test") => {
            let options = LoadTestOptions::parse(&args[2..])?;
            load_test(&options)
        }
        Some(cmd) => anyhow::bail!("Unknown command: {cmd}"),
        None => {
            eprintln!("Usage: cargo xtask <command>");
            eprintln!("Commands:");
            eprintln!("  load-test    Fire streaming requests at a /stream endpoint and report latency");
            eprintln!();
            eprintln!("load-test options:");
            eprintln!("  --url <url>             default {DEFAULT_ENDPOINT}/stream");
            eprintln!("  -n, --requests <n>      total requests (default 1)");
            eprintln!("  -c, --concurrency <n>   requests in flight (default 1)");
            eprintln!("  --prompt <text>         single prompt");
            eprintln!("  --prompts-file <path>   one prompt per line, used round-robin");
            eprintln!("  -v, --verbose           print every NDJSON line");
            Ok(())
        }
    }
}

// ── Load test ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum RequestResult {
    Ok {
        ttfb: Duration,
        total: Duration,
        lines: usize,
        bytes: usize,
        had_text: bool,
    },
    Failed {
        status: u16,
        error: String,
    },
}

fn load_test(options: &LoadTestOptions) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(None)
        .build()
        .context("Failed to build HTTP client")?;

    let next = AtomicUsize::new(0);
    let results = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..options.concurrency.min(options.requests.max(1)))
            .map(|_| {
                scope.spawn(|| {
                    let mut mine = Vec::new();
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        if i >= options.requests {
                            break mine;
                        }
                        let prompt = &options.prompts[i % options.prompts.len()];
                        mine.push(one_request(&client, &options.url, prompt, options.verbose));
                    }
                })
            })
            .collect();

        collect_joined(workers.into_iter().map(|w| w.join()))
    })?;

    print!("{}", Summary::from_results(&results).render(&options.url));
    Ok(())
}

/// Merge per-worker results; a panicked worker fails the whole run
fn collect_joined<I>(joined: I) -> Result<Vec<RequestResult>>
where
    I: IntoIterator<Item = std::thread::Result<Vec<RequestResult>>>,
{
    let mut all = Vec::new();
    for (i, worker) in joined.into_iter().enumerate() {
        let results = worker.map_err(|_| anyhow::anyhow!("load-test worker {i} panicked"))?;
        all.extend(results);
    }
    Ok(all)
}

fn one_request(
    client: &reqwest::blocking::Client,
    url: &str,
    prompt: &str,
    verbose: bool,
) -> RequestResult {
    let started = Instant::now();
    let response = match client
        .post(url)
        .header("Accept", "application/x-ndjson")
        .header("Accept-Encoding", "identity")
        .json(&GenerateRequest::new(prompt))
        .send()
    {
        Ok(response) => response,
        Err(e) => {
            return RequestResult::Failed {
                status: 0,
                error: e.to_string(),
            };
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return RequestResult::Failed {
            status: status.as_u16(),
            error: body.chars().take(300).collect(),
        };
    }

    let mut reader = BufReader::new(response);
    let mut ttfb = None;
    let mut lines = 0;
    let mut bytes = 0;
    let mut had_text = false;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(n) => {
                ttfb.get_or_insert_with(|| started.elapsed());
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                if line.is_empty() {
                    continue;
                }
                lines += 1;
                bytes += n;
                if verbose {
                    println!("{line}");
                }
                if let Ok(parsed) = parse_line(line) {
                    had_text |= parsed.response.is_some_and(|r| !r.is_empty());
                }
            }
            // Upstream closed early; count what arrived
            Err(_) => break,
        }
    }

    let total = started.elapsed();
    RequestResult::Ok {
        ttfb: ttfb.unwrap_or(total),
        total,
        lines,
        bytes,
        had_text,
    }
}

// ── Summary ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct Summary {
    requests: usize,
    succeeded: usize,
    failed: usize,
    first_failure: Option<(u16, String)>,
    lines: usize,
    bytes: usize,
    with_text: usize,
    ttfb: Vec<Duration>,
    totals: Vec<Duration>,
}

/// Nearest-rank-below percentile of sorted values
fn percentile(sorted: &[Duration], q: f64) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() - 1) as f64 * q) as usize;
    Some(sorted[idx])
}

impl Summary {
    fn from_results(results: &[RequestResult]) -> Self {
        let mut summary = Summary {
            requests: results.len(),
            ..Default::default()
        };
        for result in results {
            match result {
                RequestResult::Ok {
                    ttfb,
                    total,
                    lines,
                    bytes,
                    had_text,
                } => {
                    summary.succeeded += 1;
                    summary.lines += lines;
                    summary.bytes += bytes;
                    summary.with_text += usize::from(*had_text);
                    summary.ttfb.push(*ttfb);
                    summary.totals.push(*total);
                }
                RequestResult::Failed { status, error } => {
                    summary.failed += 1;
                    summary
                        .first_failure
                        .get_or_insert_with(|| (*status, error.clone()));
                }
            }
        }
        summary.ttfb.sort();
        summary.totals.sort();
        summary
    }

    fn render(&self, url: &str) -> String {
        let secs = |d: Option<Duration>| {
            d.map(|d| format!("{:.3}s", d.as_secs_f64()))
                .unwrap_or_else(|| "-".to_string())
        };

        let mut out = format!(
            "\nURL: {url}\nRequests: {}  |  Success: {}  |  Failures: {}\n",
            self.requests, self.succeeded, self.failed
        );
        if let Some((status, error)) = &self.first_failure {
            out.push_str(&format!(
                "Example failure -> status: {status} error: {error}\n"
            ));
        }
        if self.succeeded > 0 {
            out.push_str(&format!(
                "Lines read: {}  |  Bytes: {}  |  Responses with text: {}\n",
                self.lines, self.bytes, self.with_text
            ));
            out.push_str(&format!(
                "TTFB p50: {}  p95: {}\n",
                secs(percentile(&self.ttfb, 0.50)),
                secs(percentile(&self.ttfb, 0.95))
            ));
            out.push_str(&format!(
                "Total p50: {}  p95: {}\n\n",
                secs(percentile(&self.totals, 0.50)),
                secs(percentile(&self.totals, 0.95))
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_defaults() {
        let options = LoadTestOptions::parse(&[]).unwrap();
        assert_eq!(options.url, "http://10.100.201.91:8000/stream");
        assert_eq!(options.requests, 1);
        assert_eq!(options.concurrency, 1);
        assert_eq!(options.prompts, vec![DEFAULT_PROMPT.to_string()]);
        assert!(!options.verbose);
    }

    #[test]
    fn test_parse_flags() {
        let options = LoadTestOptions::parse(&args(&[
            "--url",
            "http://localhost:8000/stream",
            "-n",
            "20",
            "-c",
            "4",
            "--prompt",
            "hi",
            "-v",
        ]))
        .unwrap();
        assert_eq!(options.requests, 20);
        assert_eq!(options.concurrency, 4);
        assert_eq!(options.prompts, vec!["hi".to_string()]);
        assert!(options.verbose);
    }

    #[test]
    fn test_parse_errors() {
        assert!(LoadTestOptions::parse(&args(&["-n"])).is_err());
        assert!(LoadTestOptions::parse(&args(&["-n", "many"])).is_err());
        assert!(LoadTestOptions::parse(&args(&["--bogus"])).is_err());
    }

    #[test]
    fn test_percentile() {
        let ms = |v: u64| Duration::from_millis(v);
        let sorted: Vec<Duration> = (1..=10).map(ms).collect();
        assert_eq!(percentile(&sorted, 0.50), Some(ms(5)));
        assert_eq!(percentile(&sorted, 0.95), Some(ms(9)));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_panicked_worker_fails_the_run() {
        let refused = RequestResult::Failed {
            status: 0,
            error: "refused".into(),
        };
        let joined: Vec<std::thread::Result<Vec<RequestResult>>> =
            vec![Ok(vec![refused.clone()]), Ok(vec![refused.clone(), refused])];
        assert_eq!(collect_joined(joined).unwrap().len(), 3);

        let joined: Vec<std::thread::Result<Vec<RequestResult>>> =
            vec![Ok(Vec::new()), Err(Box::new("boom"))];
        let err = collect_joined(joined).unwrap_err();
        assert!(err.to_string().contains("worker 1 panicked"));
    }

    #[test]
    fn test_summary() {
        let results = vec![
            RequestResult::Ok {
                ttfb: Duration::from_millis(100),
                total: Duration::from_millis(900),
                lines: 12,
                bytes: 600,
                had_text: true,
            },
            RequestResult::Failed {
                status: 503,
                error: "busy".into(),
            },
            RequestResult::Ok {
                ttfb: Duration::from_millis(50),
                total: Duration::from_millis(700),
                lines: 3,
                bytes: 90,
                had_text: false,
            },
        ];
        let summary = Summary::from_results(&results);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.lines, 15);
        assert_eq!(summary.with_text, 1);
        assert_eq!(summary.first_failure, Some((503, "busy".to_string())));

        let text = summary.render("http://x/stream");
        assert!(text.contains("Requests: 3  |  Success: 2  |  Failures: 1"));
        assert!(text.contains("Example failure -> status: 503 error: busy"));
        assert!(text.contains("TTFB p50: 0.050s"));
    }
}
