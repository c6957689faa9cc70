use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::{
    domain::{QuestionId, Role},
    protocol::NewQuestion,
};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/server.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Promote an existing account to event admin.
    PromoteAdmin { email: String },
    /// Seed a riddle question.
    CreateQuestion {
        index: i64,
        title: String,
        question: String,
        answer: String,
        #[arg(long)]
        img_url: Option<String>,
        #[arg(long)]
        clue: Option<String>,
        #[arg(long)]
        legendary: bool,
    },
    /// Print every stored question.
    ListQuestions,
    /// Remove a question by id.
    DeleteQuestion { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::PromoteAdmin { email } => {
            let Some(user) = storage.find_user_by_email(&email).await? else {
                anyhow::bail!("no account with email {email}");
            };
            storage.set_role(user.user_id, Role::Admin).await?;
            println!("promoted user_id={} to admin", user.user_id.0);
        }
        Command::CreateQuestion {
            index,
            title,
            question,
            answer,
            img_url,
            clue,
            legendary,
        } => {
            let question_id = storage
                .create_question(&NewQuestion {
                    index,
                    title,
                    question,
                    img_url,
                    clue,
                    answer,
                    is_legendary: legendary,
                })
                .await?;
            println!("created question_id={}", question_id.0);
        }
        Command::ListQuestions => {
            for question in storage.list_questions().await? {
                println!(
                    "#{} [{}] {}{}",
                    question.question_id.0,
                    question.index,
                    question.title,
                    if question.is_legendary {
                        " (legendary)"
                    } else {
                        ""
                    }
                );
            }
        }
        Command::DeleteQuestion { id } => {
            match storage.delete_question(QuestionId(id)).await? {
                Some(question) => println!(
                    "deleted question_id={} ({})",
                    question.question_id.0, question.title
                ),
                None => println!("no question with id {id}"),
            }
        }
    }

    Ok(())
}
