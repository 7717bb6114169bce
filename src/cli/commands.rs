//! CLI commands

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::core::model::{page_filename, page_name_from_file};
use crate::core::{export, templates, NewPage, NewProject, Page, PromptOutcome, Workspace};
use crate::db::{Database, ProjectStore};
use crate::session::prompts::{self, Attachment};
use crate::session::GeminiProvider;

#[derive(Parser)]
#[command(name = "sitesmith")]
#[command(about = "Build multi-page websites by describing them to an AI model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: ~/.sitesmith/config.yml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Database path (overrides the config file)
    #[arg(long, global = true)]
    database: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all projects
    Projects,

    /// Create a new project and make it active
    NewProject {
        /// Start from a built-in template
        #[arg(long, conflicts_with = "prompt")]
        template: Option<String>,

        /// Generate the first page from a description
        #[arg(long)]
        prompt: Option<String>,
    },

    /// Make a stored project active
    OpenProject {
        /// Project ID
        id: String,
    },

    /// Delete a project
    DeleteProject {
        /// Project ID
        id: String,
    },

    /// Rename a project (the active one by default)
    RenameProject {
        /// New name
        name: String,

        /// Project ID
        #[arg(long)]
        id: Option<String>,
    },

    /// List pages of the active project
    Pages,

    /// Clone the home page into a new page and let the model adapt it
    AddPage {
        /// Display name
        name: String,

        /// Filename, e.g. about.html
        path: String,

        /// Regenerate shared navigation for all pages afterwards
        #[arg(long)]
        refresh_nav: bool,
    },

    /// Change a page's display name and/or filename
    UpdatePage {
        /// Page path or ID
        page: String,

        /// New display name
        #[arg(long)]
        name: Option<String>,

        /// New filename; links in every page are rewritten
        #[arg(long)]
        path: Option<String>,
    },

    /// Delete a page
    DeletePage {
        /// Page path or ID
        page: String,
    },

    /// Resolve a link target the way the preview does
    Navigate {
        /// Link target, e.g. ./about.html#team
        href: String,
    },

    /// Ask the model to change a page
    Prompt {
        /// Request text
        text: String,

        /// Target page path or ID (default: home page)
        #[arg(long)]
        page: Option<String>,

        /// Create a page with this display name first
        #[arg(long)]
        new_page_name: Option<String>,

        /// Filename of the page to create (default: derived from the name)
        #[arg(long, requires = "new_page_name")]
        new_page_path: Option<String>,

        /// File with starting html for the new page
        #[arg(long, requires = "new_page_name")]
        seed: Option<PathBuf>,

        /// File whose content is attached to the request
        #[arg(long)]
        attach: Option<PathBuf>,

        /// Create a new page named after the attached file
        #[arg(long, requires = "attach", conflicts_with = "new_page_name")]
        attach_as_page: bool,
    },

    /// Align a page's navigation menu with the page list
    SyncLinks {
        /// Page path or ID (default: home page)
        #[arg(long)]
        page: Option<String>,
    },

    /// Regenerate one shared header and footer for every page
    RefreshNav,

    /// Print a page's html
    Show {
        /// Page path or ID (default: home page)
        page: Option<String>,
    },

    /// Replace a page's html with the contents of a file ("-" for stdin)
    Edit {
        /// Source file
        file: String,

        /// Page path or ID (default: home page)
        #[arg(long)]
        page: Option<String>,
    },

    /// Show the chat transcript of the active project
    Messages,

    /// Export the active project as a zip archive
    Export {
        /// Output file (default: derived from the project name)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Write all projects to a JSON backup
    Backup {
        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Replace all projects with a JSON backup
    Restore {
        /// Backup file
        file: PathBuf,
    },

    /// Salvage project records stored under unexpected keys
    Recover,

    /// List built-in templates
    Templates,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let db_path = match cli.database {
        Some(path) => PathBuf::from(path),
        None => config.resolve_db_path()?,
    };

    let db = Database::new(&db_path)?;
    let store = Arc::new(ProjectStore::new(db));
    let provider = Arc::new(GeminiProvider::from_config(&config.gemini));
    let debounce = Duration::from_millis(config.autosave_debounce_ms);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(async {
        let workspace = Workspace::open(store, provider, debounce).await?;
        let result = execute(&workspace, cli.command).await;

        if workspace.is_saving() {
            tracing::info!("Waiting for pending changes to be saved");
        }
        workspace.flush().await?;
        result
    })
}

async fn execute(workspace: &Workspace, command: Commands) -> Result<()> {
    match command {
        Commands::Projects => {
            let projects = workspace.list_projects().await?;
            let active = workspace.project().await.id;

            if projects.is_empty() {
                println!("No projects found");
            } else {
                for project in projects {
                    println!(
                        "{} [{}] {} - {} pages, updated {}",
                        if project.id == active { "*" } else { " " },
                        project.id.chars().take(8).collect::<String>(),
                        project.name,
                        project.pages.len(),
                        format_millis(project.last_updated)
                    );
                }
            }
            Ok(())
        }

        Commands::NewProject { template, prompt } => {
            let kind = match (template, prompt) {
                (Some(id), _) => NewProject::Template(id),
                (None, Some(prompt)) => NewProject::Ai(prompt),
                (None, None) => NewProject::Blank,
            };

            let (project, outcome) = workspace.create_project(kind).await?;
            println!("Created project: {} ({})", project.name, project.id);
            if let Some(outcome) = outcome {
                print_outcome(&outcome);
            }
            Ok(())
        }

        Commands::OpenProject { id } => {
            let project = workspace.select_project(&id).await?;
            println!("Opened project: {} ({})", project.name, project.id);
            Ok(())
        }

        Commands::DeleteProject { id } => {
            workspace.delete_project(&id).await?;
            let active = workspace.project().await;
            println!("Deleted project: {}", id);
            println!("Active project: {} ({})", active.name, active.id);
            Ok(())
        }

        Commands::RenameProject { name, id } => {
            let id = match id {
                Some(id) => id,
                None => workspace.project().await.id,
            };
            workspace.rename_project(&id, &name).await?;
            println!("Renamed project {} to {}", id, name);
            Ok(())
        }

        Commands::Pages => {
            let project = workspace.project().await;
            for page in &project.pages {
                println!(
                    "[{}] {} - {} ({} bytes)",
                    page.id.chars().take(8).collect::<String>(),
                    page.path,
                    page.name,
                    page.html.len()
                );
            }
            Ok(())
        }

        Commands::AddPage {
            name,
            path,
            refresh_nav,
        } => {
            let (page, outcome) = workspace.add_page(&name, &path, refresh_nav).await?;
            println!("Added page: {} ({})", page.path, page.name);
            print_outcome(&outcome);
            Ok(())
        }

        Commands::UpdatePage { page, name, path } => {
            let current = resolve_page(workspace, Some(&page)).await?;
            let name = name.unwrap_or_else(|| current.name.clone());
            let path = path.unwrap_or_else(|| current.path.clone());

            let updated = workspace.update_page(&current.id, &name, &path).await?;
            println!("Updated page: {} ({})", updated.path, updated.name);
            Ok(())
        }

        Commands::DeletePage { page } => {
            let page = resolve_page(workspace, Some(&page)).await?;
            workspace.delete_page(&page.id).await?;
            println!("Deleted page: {}", page.path);
            Ok(())
        }

        Commands::Navigate { href } => {
            match workspace.navigate(&href).await {
                Some(page) => println!("{} -> {} ({})", href, page.path, page.name),
                None => println!("{} does not name a page in this project", href),
            }
            Ok(())
        }

        Commands::Prompt {
            text,
            page,
            new_page_name,
            new_page_path,
            seed,
            attach,
            attach_as_page,
        } => {
            let attachment = match attach {
                Some(file) => Some(read_attachment(&file)?),
                None => None,
            };
            let new_page_name = match (&attachment, attach_as_page) {
                (Some(attachment), true) => Some(page_name_from_file(&attachment.file_name)),
                _ => new_page_name,
            };

            let new_page = match new_page_name {
                Some(name) => {
                    let seed_html = match seed {
                        Some(file) => Some(read_source(&file.to_string_lossy())?),
                        None => None,
                    };
                    let path = new_page_path.unwrap_or_else(|| page_filename(&name));
                    Some(NewPage {
                        name,
                        path,
                        seed_html,
                    })
                }
                None => {
                    select(workspace, page.as_deref()).await?;
                    None
                }
            };

            let request = compose_request(&text, attachment.as_ref(), new_page.as_ref());
            let outcome = workspace.send_prompt(&request, new_page).await?;
            print_outcome(&outcome);
            Ok(())
        }

        Commands::SyncLinks { page } => {
            select(workspace, page.as_deref()).await?;
            let outcome = workspace.sync_links().await?;
            print_outcome(&outcome);
            Ok(())
        }

        Commands::RefreshNav => {
            let changed = workspace.refresh_navigation().await?;
            println!("Updated navigation on {} pages", changed);
            Ok(())
        }

        Commands::Show { page } => {
            let page = resolve_page(workspace, page.as_deref()).await?;
            println!("{}", page.html);
            Ok(())
        }

        Commands::Edit { file, page } => {
            select(workspace, page.as_deref()).await?;
            let html = read_source(&file)?;
            workspace.update_code(&html).await?;
            println!("Updated {} bytes", html.len());
            Ok(())
        }

        Commands::Messages => {
            let project = workspace.project().await;
            if project.messages.is_empty() {
                println!("No messages yet");
            }
            for message in &project.messages {
                println!(
                    "[{}] {}: {}",
                    format_millis(message.timestamp),
                    message.role.as_str(),
                    message.content
                );
            }
            Ok(())
        }

        Commands::Export { output } => {
            let project = workspace.project().await;
            let output = output.unwrap_or_else(|| PathBuf::from(export::archive_name(&project.name)));

            let file = File::create(&output)
                .with_context(|| format!("Failed to create {:?}", output))?;
            export::write_zip(&project, file)?;
            println!("Exported {} pages to {}", project.pages.len(), output.display());
            Ok(())
        }

        Commands::Backup { output } => {
            // Pending edits must be in the backup
            workspace.flush().await?;
            let data = workspace.store().export_all().await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, data)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Wrote backup to {}", path.display());
                }
                None => println!("{}", data),
            }
            Ok(())
        }

        Commands::Restore { file } => {
            let data = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            if workspace.store().import(&data).await? {
                println!("Restored projects from {}", file.display());
                Ok(())
            } else {
                anyhow::bail!("{} is not a valid backup; nothing was changed", file.display())
            }
        }

        Commands::Recover => {
            let count = workspace.store().recover().await?;
            println!("Recovered {} projects", count);
            Ok(())
        }

        Commands::Templates => {
            for template in templates::TEMPLATES {
                println!("{} - {}", template.id, template.name);
            }
            Ok(())
        }
    }
}

/// Find a page by path (case-insensitive) or id; the home page when `None`
async fn resolve_page(workspace: &Workspace, reference: Option<&str>) -> Result<Page> {
    let project = workspace.project().await;
    let page = match reference {
        Some(r) => project
            .pages
            .iter()
            .find(|p| p.has_path(r) || p.id == r || p.id.starts_with(r)),
        None => project.home_page(),
    };
    page.cloned()
        .with_context(|| format!("No page matches {:?}", reference.unwrap_or_default()))
}

/// Make the referenced page active
async fn select(workspace: &Workspace, reference: Option<&str>) -> Result<()> {
    if reference.is_some() {
        let page = resolve_page(workspace, reference).await?;
        workspace.set_active_page(&page.id).await?;
    }
    Ok(())
}

fn read_source(file: &str) -> Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))
}

fn read_attachment(file: &Path) -> Result<Attachment> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    Ok(Attachment { file_name, content })
}

/// Request text as sent to the model, with any attachment and new-page note
fn compose_request(text: &str, attachment: Option<&Attachment>, new_page: Option<&NewPage>) -> String {
    let mut request = match attachment {
        Some(attachment) => prompts::with_attachment(text, attachment),
        None => text.to_string(),
    };
    if let Some(page) = new_page {
        request = prompts::with_new_page_action(&request, &page.name, &page.path);
    }
    request
}

fn print_outcome(outcome: &PromptOutcome) {
    match outcome {
        PromptOutcome::CodeApplied { path, .. } => println!("Updated code for {}.", path),
        PromptOutcome::Text(text) => println!("{}", text),
        PromptOutcome::Failed(error) => println!("Generation failed: {}", error),
        PromptOutcome::Discarded { page_id } => {
            println!("Page {} no longer exists; response discarded", page_id)
        }
    }
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
