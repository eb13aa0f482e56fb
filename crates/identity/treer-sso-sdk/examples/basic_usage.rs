//! Minimal integration: exchange an authorization code for the user's profile
//!
//! Reads `SSO_CLIENT_ID`, `SSO_CLIENT_SECRET` and `SSO_AUTH_CODE` from the
//! environment (a `.env` file is picked up too).

use treer_sso_sdk::get_user_info_by_code;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treer_sso_sdk=debug".into()),
        )
        .init();

    let client_id =
        std::env::var("SSO_CLIENT_ID").unwrap_or_else(|_| "your_client_id".to_string());
    let client_secret =
        std::env::var("SSO_CLIENT_SECRET").unwrap_or_else(|_| "your_client_secret".to_string());
    let code = std::env::var("SSO_AUTH_CODE").unwrap_or_else(|_| "example_auth_code".to_string());

    println!("Treer SSO SDK v{} - basic usage", treer_sso_sdk::VERSION);
    println!("=====================================");

    match get_user_info_by_code(&code, &client_id, &client_secret, None, None, None).await {
        Ok(user) => {
            println!("✅ Signed in");
            println!("ID: {}", user.id);
            println!("Username: {}", user.username);
            println!("Email: {}", user.email.as_deref().unwrap_or("not set"));
            if let Some(profile) = &user.profile {
                println!("Name: {}", profile.full_name());
            }
        }
        Err(e) => {
            println!("❌ Failed to fetch user info: {}", e);
        }
    }

    Ok(())
}
