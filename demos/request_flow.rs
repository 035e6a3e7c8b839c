use spanlog::context;
use spanlog::exception::{capture_error, CaptureOptions};
use spanlog::ingest::{ingest_external, ExternalRecord};
use spanlog::init::{self, LogConfig};
use spanlog::record::{ContextMap, LogLevel};
use spanlog::span::with_span_async;
use spanlog::{log_info, log_warning};
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() {
    let registry = init::init(LogConfig {
        dir: "logs".into(),
        level: LogLevel::Debug,
        console: true,
    })
    .expect("logging init");

    let request_id = context::new_request_id();
    println!("simulating request {request_id}");
    println!();

    context::with_request_id(request_id.clone(), async {
        let backend = registry.logger("orders", "BACKEND");
        log_info!(backend, "checkout started | items={}", 3);

        let mut span_context = ContextMap::new();
        span_context.insert("cart_items".to_string(), 3.into());
        let loaded: Result<usize, std::io::Error> = with_span_async(
            &registry.span_logger("orders"),
            "load_cart",
            span_context,
            async {
                sleep(Duration::from_millis(40)).await;
                Ok(3)
            },
        )
        .await;
        log_info!(backend, "cart loaded | items={}", loaded.unwrap_or(0));

        let db_error = std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused by postgres",
        );
        let mut locals = ContextMap::new();
        locals.insert("order_id".to_string(), "ord-1932".into());
        locals.insert("api_token".to_string(), "sk-not-for-logs".into());
        capture_error(
            &registry.logger("orders", "DATABASE"),
            &db_error,
            "order persistence failed",
            locals,
            &CaptureOptions::default(),
        );

        log_warning!(backend, "falling back to queued write");
    })
    .await;

    ingest_external(
        registry,
        ExternalRecord {
            level: "error".to_string(),
            message: "Uncaught TypeError: cart is undefined".to_string(),
            context: None,
            url: Some("https://shop.example/checkout".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
            session_id: Some("sess-204".to_string()),
            correlation_id: Some(request_id.clone()),
            timestamp: None,
        },
    );

    registry.flush();
    println!();
    println!("wrote to ./logs - try: spanlog-view --request-id {request_id}");
}
