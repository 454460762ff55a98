use nutriplan::diets::services::generate_default_diets;
use nutriplan::state::AppState;
use nutriplan::users::repo_types::User;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "nutriplan=debug,sqlx=warn".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = AppState::init().await?;

    // Run migrations if present
    if let Err(e) = sqlx::migrate!("./migrations").run(&state.db).await {
        tracing::warn!(error = %e, "migrations folder not found or migration failed; continuing");
    }

    // Maintenance entry point: generate the default diet batch for a user.
    match std::env::args().nth(1) {
        Some(email) => {
            let user = User::find_by_email(&state.db, &email)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no user with email {email}"))?;
            let mut rng = rand::thread_rng();
            let diets = generate_default_diets(&state, user.id, &mut rng).await?;
            for diet in &diets {
                tracing::info!(
                    name = %diet.name,
                    foods = diet.items.len(),
                    calories = diet.totals.calories,
                    "diet generated"
                );
            }
            println!("{}", serde_json::to_string_pretty(&diets)?);
        }
        None => {
            tracing::info!("migrations applied; pass a user email to generate default diets");
        }
    }

    Ok(())
}
