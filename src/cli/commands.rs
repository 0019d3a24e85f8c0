//! Interactive designer session: menu loop and play mode.
//!
//! All text I/O goes through the `BufRead`/`Write` parameters so the
//! integration tests can script whole sessions against in-memory buffers.

use std::io::{BufRead, Write};

use anyhow::Result;
use tracing::{debug, instrument};

use crate::node::Slot;
use crate::tree::SceneTree;

/// Runs one full designer session: prompts for the opening scene, then
/// loops over the menu until the user quits or input ends.
#[instrument(skip_all)]
pub fn run_designer(input: &mut impl BufRead, out: &mut impl Write) -> Result<()> {
    writeln!(out, "Creating a story...")?;
    let title = prompt_line(input, out, "Please enter a title: ")?;
    let description = prompt_line(input, out, "Please enter a scene: ")?;

    let mut tree = SceneTree::new();
    // The first scene on an empty tree cannot fail
    let id = tree.add_scene(&title, &description)?;
    writeln!(out, "Scene #{} added.", id)?;

    loop {
        print_menu(out)?;
        write!(out, "\nPlease enter a selection: ")?;
        out.flush()?;
        let Some(choice) = read_line(input)? else {
            break;
        };
        debug!("menu selection: {:?}", choice);

        match choice.trim().to_ascii_uppercase().as_str() {
            "A" => add_scene(&mut tree, input, out)?,
            "R" => remove_scene(&mut tree, input, out)?,
            "S" => write!(out, "{}", tree.render_summary())?,
            "P" => writeln!(out, "\n{}", tree.render_outline())?,
            "B" => match tree.move_cursor_back() {
                Ok(()) => writeln!(out, "Successfully moved back to {}.", cursor_title(&tree))?,
                Err(e) => writeln!(out, "{}", e)?,
            },
            "F" => move_forward(&mut tree, input, out)?,
            "G" => {
                writeln!(out, "\nNow beginning game...\n")?;
                play_game(&tree, input, out)?;
                writeln!(out, "\nReturning back to creation mode...")?;
            }
            "N" => writeln!(out, "\n{}", tree.path_from_root().join(", "))?,
            "M" => move_scene(&mut tree, input, out)?,
            "Q" => {
                writeln!(out, "Program terminating normally...")?;
                break;
            }
            _ => writeln!(out, "Invalid menu option.")?,
        }
    }
    Ok(())
}

fn add_scene(tree: &mut SceneTree, input: &mut impl BufRead, out: &mut impl Write) -> Result<()> {
    let title = prompt_line(input, out, "\nPlease enter a title: ")?;
    let description = prompt_line(input, out, "Please enter a scene: ")?;
    match tree.add_scene(&title, &description) {
        Ok(id) => writeln!(out, "\nScene #{} added.", id)?,
        Err(e) => writeln!(out, "\n{}", e)?,
    }
    Ok(())
}

fn remove_scene(
    tree: &mut SceneTree,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    let line = prompt_line(input, out, "Please enter an option (A, B, or C): ")?;
    let outcome = line
        .parse::<Slot>()
        .and_then(|slot| tree.remove_child(slot));
    match outcome {
        Ok(()) => writeln!(out, "Scene removed.")?,
        Err(e) => writeln!(out, "{}", e)?,
    }
    Ok(())
}

fn move_forward(
    tree: &mut SceneTree,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    let line = prompt_line(input, out, "Which option do you wish to go to: ")?;
    let outcome = line
        .parse::<Slot>()
        .and_then(|slot| tree.move_cursor_forward(slot));
    match outcome {
        Ok(()) => writeln!(out, "Successfully moved to {}.", cursor_title(tree))?,
        Err(e) => writeln!(out, "{}", e)?,
    }
    Ok(())
}

fn move_scene(tree: &mut SceneTree, input: &mut impl BufRead, out: &mut impl Write) -> Result<()> {
    let line = prompt_line(input, out, "Move current scene to: ")?;
    let Ok(target_id) = line.trim().parse::<u32>() else {
        writeln!(out, "Invalid scene ID: {}", line.trim())?;
        return Ok(());
    };
    match tree.move_scene(target_id) {
        Ok(()) => writeln!(out, "Successfully moved scene.")?,
        Err(e) => writeln!(out, "{}", e)?,
    }
    Ok(())
}

/// Walks the story from the root, following the player's choices until an
/// ending scene. The editing cursor is untouched; play uses its own
/// position. Options are shown with their storage-slot letters.
#[instrument(skip_all)]
pub fn play_game(tree: &SceneTree, input: &mut impl BufRead, out: &mut impl Write) -> Result<()> {
    let Some(mut current) = tree.root() else {
        return Ok(());
    };

    loop {
        let Some(node) = tree.get(current) else {
            return Ok(());
        };
        writeln!(out, "{}", node.title())?;
        writeln!(out, "{}", node.description())?;
        if node.is_ending() {
            writeln!(out, "\nThe End")?;
            return Ok(());
        }
        writeln!(out)?;
        for slot in Slot::ALL {
            if let Some(child) = node.slot(slot) {
                if let Some(child_node) = tree.get(child) {
                    writeln!(out, "{}) {}", slot, child_node.title())?;
                }
            }
        }
        write!(out, "\nPlease enter an option: ")?;
        out.flush()?;

        let Some(line) = read_line(input)? else {
            return Ok(());
        };
        let Ok(slot) = line.parse::<Slot>() else {
            writeln!(out, "Invalid choice, returning to main menu.")?;
            return Ok(());
        };
        match node.slot(slot) {
            Some(next) => current = next,
            None => {
                writeln!(out, "That option does not exist.")?;
                return Ok(());
            }
        }
    }
}

fn print_menu(out: &mut impl Write) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "A) Add Scene")?;
    writeln!(out, "R) Remove Scene")?;
    writeln!(out, "S) Show Current Scene")?;
    writeln!(out, "P) Print Adventure Tree")?;
    writeln!(out, "B) Go Back A Scene")?;
    writeln!(out, "F) Go Forward A Scene")?;
    writeln!(out, "G) Play Game")?;
    writeln!(out, "N) Print Path To Cursor")?;
    writeln!(out, "M) Move Scene")?;
    writeln!(out, "Q) Quit")?;
    Ok(())
}

fn cursor_title(tree: &SceneTree) -> String {
    tree.cursor_node()
        .map(|node| node.title().to_string())
        .unwrap_or_default()
}

/// Reads one line, stripped of the trailing newline. `None` on EOF.
fn read_line(input: &mut impl BufRead) -> Result<Option<String>> {
    let mut buf = String::new();
    if input.read_line(&mut buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(buf.trim_end_matches(['\n', '\r']).to_string()))
}

fn prompt_line(input: &mut impl BufRead, out: &mut impl Write, prompt: &str) -> Result<String> {
    write!(out, "{}", prompt)?;
    out.flush()?;
    Ok(read_line(input)?.unwrap_or_default())
}
