use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ytdlp_backend::{
    AppState,
    config::Config,
    routes::create_router,
    services::{YouTubeApi, YtDlp},
    spawn_sweeper,
};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    if config.require_api_key && config.api_key.is_empty() {
        tracing::warn!("REQUIRE_API_KEY is set but API_KEY is empty");
    }
    if config.youtube_api_key.is_empty() {
        tracing::warn!("YOUTUBE_API_KEY is not set, /trending will fail");
    }

    // 外部数据来源
    let extractor = Arc::new(YtDlp::new(config.ytdlp_bin.clone(), config.ytdlp_timeout()));
    let trending = Arc::new(
        YouTubeApi::new(config.youtube_api_key.clone()).expect("Failed to build YouTube API client"),
    );

    // 设置应用状态
    let state = AppState::new(config, extractor, trending).expect("Failed to set up response cache");

    spawn_sweeper(
        state.limiter.clone(),
        state.cache.clone(),
        state.config.sweep_interval(),
    );

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    let app = create_router(state);

    // 启动服务器
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
