use std::{error::Error, sync::Arc};

use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use jsonwebtoken::{DecodingKey, EncodingKey};
use tokio::{fs, net, task};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
};

use helpdesk::{
    config, db,
    http::{self, AppState},
    mail::Mailer,
    scheduler::Scheduler,
    Config,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = fs::read_to_string("config.toml").await?;
    let config = toml::from_str::<Config>(&config)?;

    let (db_client, db_connection) = db::connect(config.db).await?;

    task::spawn(async move {
        if let Err(e) = db_connection.await {
            panic!("database connection failed: {e}");
        }
    });

    db_client.migrate().await?;
    if let Some(bootstrap) = config.bootstrap {
        bootstrap_administrator(&db_client, bootstrap).await?;
    }

    let origins = config
        .http
        .cors
        .allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_origin(AllowOrigin::list(origins));

    let mailer = Mailer::new(config.smtp);
    task::spawn(
        Scheduler::new(db_client.clone(), mailer.clone(), config.scheduler)
            .run(),
    );

    let app = http::router(Arc::new(AppState {
        db_client,
        mailer,
        jwt_expiration_time: config.jwt.expiration_time,
        jwt_decoding_key: DecodingKey::from_secret(config.jwt.secret.as_bytes()),
        jwt_encoding_key: EncodingKey::from_secret(config.jwt.secret.as_bytes()),
    }))
    .layer(cors);

    let listener = net::TcpListener::bind(config.http.server.addr).await?;
    tracing::info!(addr = %config.http.server.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Creates the configured administrator unless the login already exists.
async fn bootstrap_administrator(
    db_client: &db::Client,
    bootstrap: config::Bootstrap,
) -> Result<(), Box<dyn Error>> {
    if db_client.get_user_by_login(&bootstrap.login).await?.is_some() {
        return Ok(());
    }

    let user = db::User {
        id: db::user::Id::new(),
        name: bootstrap.name,
        role: db::user::Role::Admin,
        login: bootstrap.login,
        password_hash: db::user::PasswordHash::new(&bootstrap.password)
            .map_err(|e| format!("cannot hash bootstrap password: {e}"))?,
        email: bootstrap.email,
        agency: None,
        phone: None,
        status: db::user::Status::Active,
        specialization: None,
    };
    db_client.write_user(&user).await?;

    tracing::info!(login = %user.login, "administrator account created");
    Ok(())
}
