use std::collections::BTreeMap;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_lambda_events::apigw::ApiGatewayProxyRequest;
use aws_sdk_lambda::Client;
use chrono::Utc;
use clap::Parser;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;

#[derive(Default)]
struct Stats {
    by_status: BTreeMap<u16, usize>,
    invoke_errors: usize,
    success_latency_ms: f64,
}

/// The parts of an API Gateway proxy response we look at.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyResponse {
    status_code: u16,
    body: Option<String>,
}

#[derive(Parser, Debug)]
#[command(name = "invoke-test")]
#[command(about = "Invoke the create-program function with generated programs")]
struct Args {
    /// Lambda function name
    function: String,

    /// Number of iterations to run
    #[arg(long, default_value = "100")]
    iters: usize,

    /// Number of parallel threads
    #[arg(long, default_value = "1")]
    threads: usize,

    /// Drop the title from every K-th request (0 disables)
    #[arg(long, default_value = "0")]
    invalid_every: usize,
}

/// Body for the `iteration`-th request (1-based), titled after `now_ms`.
fn program_body(iteration: usize, invalid_every: usize, now_ms: i64) -> serde_json::Value {
    let description = "Time to learn new program!";
    if invalid_every > 0 && iteration % invalid_every == 0 {
        return serde_json::json!({ "description": description });
    }
    serde_json::json!({
        "title": format!("Program: vol.{now_ms}"),
        "description": description,
    })
}

fn proxy_event(body: &serde_json::Value) -> anyhow::Result<Vec<u8>> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let request = ApiGatewayProxyRequest {
        path: Some("/programs".to_string()),
        http_method: http::Method::POST,
        headers,
        body: Some(body.to_string()),
        ..Default::default()
    };
    Ok(serde_json::to_vec(&request)?)
}

async fn run_invocations(
    client: Arc<Client>,
    function_name: String,
    thread_id: usize,
    start: usize,
    end: usize,
    total: usize,
    invalid_every: usize,
    stats: Arc<Mutex<Stats>>,
) -> anyhow::Result<()> {
    for i in start..=end {
        let body = program_body(i, invalid_every, Utc::now().timestamp_millis());
        let payload = proxy_event(&body)?;

        let started = Instant::now();
        let result = client
            .invoke()
            .function_name(&function_name)
            .payload(aws_sdk_lambda::primitives::Blob::new(payload))
            .send()
            .await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(response) => {
                let response_payload = response
                    .payload()
                    .map(|b| String::from_utf8_lossy(b.as_ref()).to_string())
                    .unwrap_or_else(|| "No response".to_string());

                match serde_json::from_str::<ProxyResponse>(&response_payload) {
                    Ok(proxy) => {
                        {
                            let mut stats = stats.lock().await;
                            *stats.by_status.entry(proxy.status_code).or_default() += 1;
                            if proxy.status_code == 200 {
                                stats.success_latency_ms += latency_ms;
                            }
                        }

                        println!(
                            "[Thread {}: {}/{}] {} => {} {} ({:.3}ms)",
                            thread_id,
                            i,
                            total,
                            body,
                            proxy.status_code,
                            proxy.body.unwrap_or_default(),
                            latency_ms
                        );
                    }
                    Err(_) => {
                        // Function errors come back as {"errorType", "errorMessage"}
                        stats.lock().await.invoke_errors += 1;
                        eprintln!(
                            "[Thread {}: {}/{}] {} => {}",
                            thread_id, i, total, body, response_payload
                        );
                    }
                }
            }
            Err(e) => {
                stats.lock().await.invoke_errors += 1;
                eprintln!(
                    "[Thread {}: {}/{}] Error invoking with {}: {}",
                    thread_id, i, total, body, e
                );
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    anyhow::ensure!(args.threads > 0, "--threads must be at least 1");

    println!(
        "Running {} invocations across {} thread(s)",
        args.iters, args.threads
    );

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let client = Arc::new(Client::new(&config));

    let stats = Arc::new(Mutex::new(Stats::default()));

    let iters_per_thread = args.iters / args.threads;
    let remainder = args.iters % args.threads;

    let mut tasks = JoinSet::new();

    let mut start = 1;
    for t in 1..=args.threads {
        let end = if t == args.threads {
            start + iters_per_thread - 1 + remainder
        } else {
            start + iters_per_thread - 1
        };

        let client = Arc::clone(&client);
        let function_name = args.function.clone();
        let stats = Arc::clone(&stats);
        let total = args.iters;
        let invalid_every = args.invalid_every;

        tasks.spawn(run_invocations(
            client,
            function_name,
            t,
            start,
            end,
            total,
            invalid_every,
            stats,
        ));

        start = end + 1;
    }

    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => eprintln!("Task failed: {}", e),
            Err(e) => eprintln!("Task panicked: {}", e),
        }
    }

    let stats = stats.lock().await;
    println!("Completed {} invocations", args.iters);
    println!();
    println!("Results:");
    for (status, count) in &stats.by_status {
        println!("  HTTP {}: {}", status, count);
    }
    println!("  Invoke errors: {}", stats.invoke_errors);
    if let Some(&successes) = stats.by_status.get(&200) {
        let avg_latency = stats.success_latency_ms / successes as f64;
        println!("  Avg latency (200): {:.3}ms", avg_latency);
    }

    Ok(())
}
