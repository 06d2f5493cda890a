use std::error::Error;
use std::fs;

use caseboard_core::types::{EntityKind, NoteDraft, Position};
use caseboard_core::{BoardEngine, BoardSession, PinTarget, RenderedBoard};

use crate::cli::*;

pub type CliResult = Result<(), Box<dyn Error>>;

fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn position(x: Option<f64>, y: Option<f64>) -> Option<Position> {
    match (x, y) {
        (Some(x), Some(y)) => Some(Position::new(x, y)),
        _ => None,
    }
}

/// Open a board and load its graph, so content types seen on it are known.
async fn open(engine: &BoardEngine, board_id: u64) -> Result<BoardSession, Box<dyn Error>> {
    let session = engine.open_session(board_id);
    session.graph().await?;
    Ok(session)
}

pub fn render_text(board: &RenderedBoard) -> String {
    let mut out = format!(
        "Board {} (case {}): {} items, {} connections, {} notes\n",
        board.board_id,
        board.case_id,
        board.nodes.len(),
        board.edges.len(),
        board.notes.len()
    );
    for node in &board.nodes {
        out.push_str(&format!(
            "  [{}] {:<9} {} @ ({}, {})\n",
            node.item_id, node.style.title, node.label, node.position.x, node.position.y
        ));
    }
    for edge in &board.edges {
        let label = if edge.label.is_empty() {
            String::new()
        } else {
            format!(" \"{}\"", edge.label)
        };
        out.push_str(&format!("  {} -> {}{}\n", edge.from_item, edge.to_item, label));
    }
    for note in &board.notes {
        out.push_str(&format!("  note {}: {}\n", note.id, note.title));
    }
    out
}

pub async fn dispatch(engine: &BoardEngine, command: Commands, json: bool) -> CliResult {
    match command {
        Commands::Locate(args) => match engine.locator().locate(args.case).await? {
            Some(board_id) if json => print_json(&serde_json::json!({ "board": board_id })),
            Some(board_id) => {
                println!("{}", board_id);
                Ok(())
            }
            None => Err(format!("case {} has no board", args.case).into()),
        },
        Commands::Ensure(args) => {
            let board_id = engine.locator().ensure_board(args.case).await?;
            if json {
                print_json(&serde_json::json!({ "board": board_id }))
            } else {
                println!("{}", board_id);
                Ok(())
            }
        }
        Commands::Show(args) => {
            let view = engine.open_session(args.board).view().await?;
            if json {
                print_json(&view)
            } else {
                print!("{}", render_text(&view));
                Ok(())
            }
        }
        Commands::Pin(args) => {
            let session = open(engine, args.board).await?;
            let mut target = PinTarget::new(EntityKind::from_model_name(&args.kind), args.object);
            target.content_type_id = args.content_type;
            target.position = position(args.x, args.y);
            let item = session.pin(&target).await?;
            if json {
                print_json(&item)
            } else {
                println!("Pinned as item {}", item.id);
                Ok(())
            }
        }
        Commands::Unpin(args) => {
            let session = open(engine, args.board).await?;
            session.unpin(args.item).await?;
            Ok(())
        }
        Commands::Link(args) => {
            let session = open(engine, args.board).await?;
            session.start_connection(args.from);
            match session.complete_connection(args.to, args.label).await? {
                Some(connection) if json => print_json(&connection),
                Some(connection) => {
                    println!("Created connection {}", connection.id);
                    Ok(())
                }
                None => Err("an item cannot be connected to itself".into()),
            }
        }
        Commands::Unlink(args) => {
            let session = open(engine, args.board).await?;
            session.delete_connection(args.connection).await?;
            Ok(())
        }
        Commands::Move(args) => {
            let session = open(engine, args.board).await?;
            session.on_drag(args.item, Position::new(args.x, args.y));
            let saved = session.flush_positions().await?;
            log::debug!("Saved {} positions", saved);
            Ok(())
        }
        Commands::Note(args) => {
            let session = open(engine, args.board).await?;
            let draft = NoteDraft {
                title: args.title,
                content: args.content,
            };
            let (note, item) = session.create_note(&draft, position(args.x, args.y)).await?;
            if json {
                print_json(&serde_json::json!({ "note": note, "item": item }))
            } else {
                match item {
                    Some(item) => println!("Created note {} pinned as item {}", note.id, item.id),
                    None => println!("Created note {}", note.id),
                }
                Ok(())
            }
        }
        Commands::Export(args) => {
            let svg = engine.open_session(args.board).export_svg().await?;
            match args.output {
                Some(path) => {
                    fs::write(&path, svg)?;
                    log::info!("Wrote {}", path);
                }
                None => print!("{}", svg),
            }
            Ok(())
        }
    }
}
