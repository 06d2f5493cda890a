use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "caseboard", about = "Inspect and edit investigation boards", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to <config dir>/caseboard/client.json)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// API root, e.g. http://127.0.0.1:8000/api
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Bearer token
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the board id of a case
    Locate(CaseArgs),
    /// Locate the board of a case, creating it if missing
    Ensure(CaseArgs),
    /// Show items, connections and notes of a board
    Show(BoardArgs),
    /// Pin an entity to a board
    Pin(PinArgs),
    /// Remove an item from a board
    Unpin(ItemArgs),
    /// Connect two items
    Link(LinkArgs),
    /// Delete a connection
    Unlink(UnlinkArgs),
    /// Move an item and save its position
    Move(MoveArgs),
    /// Create a note, optionally pinned
    Note(NoteArgs),
    /// Write the board as SVG
    Export(ExportArgs),
}

#[derive(Args)]
pub struct CaseArgs {
    pub case: u64,
}

#[derive(Args)]
pub struct BoardArgs {
    pub board: u64,
}

#[derive(Args)]
pub struct PinArgs {
    pub board: u64,
    /// Entity kind: case, suspect, evidence, witness, note
    pub kind: String,
    pub object: u64,
    /// Content type id, when the kind has not been seen on a board yet
    #[arg(long)]
    pub content_type: Option<u64>,
    #[arg(long, requires = "y")]
    pub x: Option<f64>,
    #[arg(long, requires = "x")]
    pub y: Option<f64>,
}

#[derive(Args)]
pub struct ItemArgs {
    pub board: u64,
    pub item: u64,
}

#[derive(Args)]
pub struct LinkArgs {
    pub board: u64,
    pub from: u64,
    pub to: u64,
    #[arg(long)]
    pub label: Option<String>,
}

#[derive(Args)]
pub struct UnlinkArgs {
    pub board: u64,
    pub connection: u64,
}

#[derive(Args)]
pub struct MoveArgs {
    pub board: u64,
    pub item: u64,
    pub x: f64,
    pub y: f64,
}

#[derive(Args)]
pub struct NoteArgs {
    pub board: u64,
    #[arg(long)]
    pub title: String,
    #[arg(long, default_value = "")]
    pub content: String,
    /// Pin the note at x,y
    #[arg(long, requires = "y")]
    pub x: Option<f64>,
    #[arg(long, requires = "x")]
    pub y: Option<f64>,
}

#[derive(Args)]
pub struct ExportArgs {
    pub board: u64,
    /// Output file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<String>,
}
