use clap::{Parser, Subcommand};
use sessionmart::{
    db,
    models::{Role, User},
    repositories::{SqliteSocialAccountRepository, SqliteUserRepository},
    services::{CreateUserRequest, CredentialService, UpdatePasswordRequest, UserService},
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sessionmart-cli")]
#[command(about = "CLI tool for managing sessionmart accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: Option<String>,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,

        /// user or creator
        #[arg(short, long, default_value_t = Role::User)]
        role: Role,
    },

    /// List all users
    List {
        /// Maximum number of users to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Delete a user
    Delete {
        #[arg(short, long)]
        username: String,
    },

    /// Set a new password for a user
    SetPassword {
        #[arg(short, long)]
        username: String,

        /// New password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Assign a role, including downgrades
    SetRole {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        role: Role,
    },
}

fn get_password(prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;

    Ok(rpassword::read_password()?)
}

fn confirm_password(prompt: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    let password = get_password(prompt)?;
    let confirm = get_password("Confirm password")?;
    Ok((password, confirm))
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

async fn find_or_exit(user_service: &UserService, username: &str) -> User {
    match user_service.find_user_by_username(username).await {
        Ok(Some(user)) => user,
        Ok(None) => fail(format!("User '{}' not found", username)),
        Err(err) => fail(format!("Failed to find user: {}", err)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let database_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
    let pool = db::create_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let user_service = UserService::new(
        Arc::new(SqliteUserRepository::new(pool.clone())),
        Arc::new(SqliteSocialAccountRepository::new(pool.clone())),
    );
    // Only used for revocation, so the lifetimes are irrelevant here
    let credential_service =
        CredentialService::new(pool, Duration::from_secs(0), Duration::from_secs(0));

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Create {
                username,
                email,
                password,
                role,
            } => {
                let (password, password_confirm) = match password {
                    Some(pw) => (pw.clone(), pw),
                    None => confirm_password("Password")?,
                };

                let request = CreateUserRequest {
                    username,
                    email,
                    password,
                    password_confirm: Some(password_confirm),
                    role: Some(role),
                };

                match user_service.create_user(request).await {
                    Ok(user) => {
                        println!("✅ User created successfully!");
                        println!("  ID: {}", user.id);
                        println!("  Username: {}", user.username);
                        println!("  Email: {}", user.email.as_deref().unwrap_or("-"));
                        println!("  Role: {}", role);
                    }
                    Err(err) => fail(format!("Failed to create user: {}", err)),
                }
            }

            UserCommands::List { limit, offset } => {
                let users = match user_service.list_users(Some(limit), Some(offset)).await {
                    Ok(users) => users,
                    Err(err) => fail(format!("Failed to list users: {}", err)),
                };

                if users.is_empty() {
                    println!("No users found.");
                } else {
                    println!(
                        "{:<5} {:<24} {:<32} {:<8} {:<20}",
                        "ID", "Username", "Email", "Role", "Created"
                    );
                    println!("{}", "-".repeat(92));
                    for user in users {
                        println!(
                            "{:<5} {:<24} {:<32} {:<8} {:<20}",
                            user.id,
                            user.username,
                            user.email.as_deref().unwrap_or("-"),
                            user.role.map(|r| r.as_str()).unwrap_or("-"),
                            user.created_at.format("%Y-%m-%d %H:%M:%S")
                        );
                    }
                }
            }

            UserCommands::Delete { username } => {
                let user = find_or_exit(&user_service, &username).await;
                match user_service.delete_user(user.id).await {
                    Ok(()) => println!("✅ User '{}' deleted successfully!", username),
                    Err(err) => fail(format!("Failed to delete user: {}", err)),
                }
            }

            UserCommands::SetPassword { username, password } => {
                let user = find_or_exit(&user_service, &username).await;
                let (new_password, password_confirm) = match password {
                    Some(pw) => (pw.clone(), pw),
                    None => confirm_password("New password")?,
                };

                let request = UpdatePasswordRequest {
                    user_id: user.id,
                    new_password,
                    new_password_confirm: Some(password_confirm),
                };

                if let Err(err) = user_service.update_password(request).await {
                    fail(format!("Failed to update password: {}", err));
                }
                // Existing sessions must sign in again with the new password
                if let Err(err) = credential_service.revoke_all(user.id).await {
                    fail(format!("Password updated but revoking tokens failed: {:#}", err));
                }
                println!("✅ Password updated successfully for '{}'!", username);
            }

            UserCommands::SetRole { username, role } => {
                let user = find_or_exit(&user_service, &username).await;
                match user_service.set_role(user.id, role).await {
                    Ok(()) => println!("✅ '{}' is now a {}", username, role),
                    Err(err) => fail(format!("Failed to set role: {}", err)),
                }
            }
        },
    }

    Ok(())
}
