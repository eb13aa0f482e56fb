//! Step by step usage of `TreerSsoClient`
//!
//! This example demonstrates:
//! 1. Building a configuration with custom settings
//! 2. Exchanging the code and fetching the user in two steps
//! 3. Doing the same in a single call
//! 4. Inspecting SSO errors

use treer_sso_sdk::{
    SsoApi, SsoConfig, SsoError, SsoSettings, TreerSsoClient, UserInfo,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Prefer SSO_* variables, fall back to placeholders
    let config = match SsoConfig::from_env() {
        Ok(config) => config,
        Err(_) => SsoSettings::builder()
            .client_id("your_client_id")
            .client_secret("your_client_secret")
            .base_url("https://sso-api.treer.ru")
            .timeout(30)
            .max_retries(3)
            .verify_tls(true)
            .build()
            .validate()?,
    };

    println!("Configuration:");
    println!("- SSO base URL: {}", config.base_url());
    println!("- Timeout: {:?}", config.timeout());
    println!("- Max retries: {}", config.max_retries());
    println!();

    let code = "example_auth_code";
    let redirect_uri = "https://yourapp.com/callback";

    let client = TreerSsoClient::new(config);
    client
        .scoped(|client| async move {
            println!("1. Two-step flow");
            match client.get_access_token(code, Some(redirect_uri)).await {
                Ok(token) => {
                    let preview: String = token.access_token.chars().take(20).collect();
                    println!("Access token: {}...", preview);
                    println!("Token type: {}", token.token_type);
                    if let Some(expires_in) = token.expires_in {
                        println!("Expires in: {}s", expires_in);
                    }

                    match client.get_user_info(&token.access_token).await {
                        Ok(user) => print_user_info(&user),
                        Err(e) => report(&e),
                    }
                }
                Err(e) => report(&e),
            }

            println!("\n2. Single call");
            match client.get_user_info_by_code(code, Some(redirect_uri)).await {
                Ok(user) => print_user_info(&user),
                Err(e) => report(&e),
            }
        })
        .await;

    println!("\n3. Configuration errors");
    if let Err(e) = SsoConfig::new("", "secret") {
        report(&e);
    }

    Ok(())
}

fn print_user_info(user: &UserInfo) {
    println!("User:");
    println!("  ID: {}", user.id);
    println!("  Username: {}", user.username);
    println!("  Email: {}", user.email.as_deref().unwrap_or("not set"));
    println!("  Phone: {}", user.phone.as_deref().unwrap_or("not set"));
    println!("  Active: {}", user.is_active);

    if let Some(profile) = &user.profile {
        println!("  Profile:");
        println!("    Name: {}", profile.full_name());
        println!("    Locale: {}", profile.locale);
        println!("    Timezone: {}", profile.timezone);
        if let Some(avatar_url) = &profile.avatar_url {
            println!("    Avatar: {}", avatar_url);
        }
        if !profile.additional_info.is_empty() {
            println!("    Additional info: {:?}", profile.additional_info);
        }
    }

    if let Some(created_at) = user.created_at {
        println!("  Created at: {}", created_at);
    }
    if let Some(updated_at) = user.updated_at {
        println!("  Updated at: {}", updated_at);
    }
}

fn report(error: &SsoError) {
    let kind = match error {
        SsoError::Config(_) => "configuration",
        SsoError::InvalidCode(_) => "invalid authorization code",
        SsoError::InvalidToken(_) => "invalid access token",
        SsoError::Authentication(_) => "authentication",
        SsoError::Network { .. } => "network",
        SsoError::Decode { .. } => "malformed response",
        SsoError::Sso(_) => "sso",
    };

    println!("❌ {} error: {}", kind, error);
    if let Some(code) = error.code() {
        println!("   code: {}", code);
    }
    if let Some(details) = error.details() {
        println!("   details: {}", details);
    }
    if error.is_authentication() {
        println!("   the user has to sign in again");
    }
}
