// UI layer: the interactive menu built on `dialoguer`. Each pass through
// the loop asks for a category, fetches images, copies them to the drive
// and rewrites the manifest.

use crate::api::Transport;
use crate::config::Config;
use crate::disk::DiskClient;
use crate::images::{CatSource, DogSource, ImageInfo};
use crate::manifest::{save_manifest, upload_images, ResultRecord};
use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::time::Duration;

pub const MAX_IMAGES: usize = 50;

/// What the user picked from the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Cats,
    Dogs,
    Exit,
}

impl Choice {
    pub fn from_number(n: u32) -> Option<Self> {
        match n {
            1 => Some(Choice::Cats),
            2 => Some(Choice::Dogs),
            3 => Some(Choice::Exit),
            _ => None,
        }
    }
}

/// How one cat or dog operation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The drive folder could not be created, most likely a bad token.
    Aborted,
    /// The source returned no images; nothing was uploaded.
    NoImages,
    Uploaded(Vec<ResultRecord>),
}

/// State kept between menu passes. Nothing here outlives the process.
#[derive(Default)]
pub struct Session {
    pub token: Option<String>,
    pub results: Vec<ResultRecord>,
}

impl Session {
    /// Fold an operation's outcome into the session. Returns true when the
    /// manifest should be written.
    pub fn record(&mut self, outcome: Outcome) -> bool {
        match outcome {
            Outcome::Aborted => {
                self.token = None;
                false
            }
            Outcome::NoImages => false,
            Outcome::Uploaded(records) => {
                println!("{} of the images were uploaded.", records.len());
                self.results.extend(records);
                true
            }
        }
    }
}

/// Main interactive menu. Runs until the user picks "Exit", declines to
/// continue, or interrupts a prompt. A prompt reports Ctrl-C as an
/// `Interrupted` error; anywhere else it is a plain SIGINT.
pub fn main_menu<T: Transport + Clone>(config: &Config, http: T) -> Result<()> {
    let mut session = Session::default();
    match run_loop(config, &http, &mut session) {
        Err(e) if is_interrupt(&e) => {
            println!();
            println!("Interrupted, bye.");
            Ok(())
        }
        other => other,
    }
}

fn run_loop<T: Transport + Clone>(config: &Config, http: &T, session: &mut Session) -> Result<()> {
    loop {
        println!();
        println!("Choose a task:");
        println!("  1. Cats (cataas.com)");
        println!("  2. Dogs (dog.ceo)");
        println!("  3. Exit");
        let number: u32 = Input::new()
            .with_prompt("Task number")
            .validate_with(|n: &u32| -> Result<(), &str> {
                match Choice::from_number(*n) {
                    Some(_) => Ok(()),
                    None => Err("Enter 1, 2 or 3"),
                }
            })
            .interact_text()?;
        let choice = Choice::from_number(number).unwrap_or(Choice::Exit);
        if choice == Choice::Exit {
            break;
        }

        // The token is asked for once and kept until the drive rejects it.
        let token = match &session.token {
            Some(token) => token.clone(),
            None => {
                let token: String = Password::new().with_prompt("Disk OAuth token").interact()?;
                session.token = Some(token.clone());
                token
            }
        };
        let disk = DiskClient::new(http.clone(), config.disk.clone(), &token);

        let outcome = match choice {
            Choice::Cats => handle_cats(config, http, &disk)?,
            Choice::Dogs => handle_dogs(config, http, &disk)?,
            Choice::Exit => break,
        };
        if session.record(outcome) {
            match save_manifest(&config.results_path, &session.results) {
                Ok(()) => println!("Results saved to {}", config.results_path.display()),
                Err(e) => println!("{} {:#}", "Could not save results:".red(), e),
            }
        }

        let again = Confirm::new()
            .with_prompt("Continue?")
            .default(true)
            .interact()?;
        if !again {
            break;
        }
    }
    Ok(())
}

/// Cat flow: folder, caption and count, then fetch and upload.
fn handle_cats<T: Transport>(config: &Config, http: &T, disk: &DiskClient<T>) -> Result<Outcome> {
    let folder: String = Input::new().with_prompt("Group (folder) name").interact_text()?;
    let caption: String = Input::new().with_prompt("Text for the cat picture").interact_text()?;
    let count = prompt_count("How many pictures")?;

    let folder = folder.trim().to_string();
    if !disk.create_folder(&folder) {
        println!("{} {}", "Could not create folder".red(), folder);
        return Ok(Outcome::Aborted);
    }

    let cats = CatSource::new(&config.cats);
    let images = with_spinner("Fetching cat pictures...", || cats.fetch(http, &caption, count))?;
    if images.is_empty() {
        println!("No cat pictures could be fetched.");
        return Ok(Outcome::NoImages);
    }
    upload(disk, &folder, &images).map(Outcome::Uploaded)
}

/// Dog flow. The breed doubles as the drive folder.
fn handle_dogs<T: Transport>(config: &Config, http: &T, disk: &DiskClient<T>) -> Result<Outcome> {
    let breed: String = Input::new().with_prompt("Dog breed").interact_text()?;
    let count = prompt_count("Pictures per sub-breed")?;

    let breed = breed.trim().to_lowercase();
    if !disk.create_folder(&breed) {
        println!("{} {}", "Could not create folder".red(), breed);
        return Ok(Outcome::Aborted);
    }

    let dogs = DogSource::new(&config.dogs);
    let images = with_spinner("Fetching dog pictures...", || dogs.fetch(http, &breed, count))?;
    if images.is_empty() {
        println!("No pictures found for breed {}.", breed);
        return Ok(Outcome::NoImages);
    }
    println!("Found {} pictures.", images.len());
    upload(disk, &breed, &images).map(Outcome::Uploaded)
}

fn prompt_count(prompt: &str) -> Result<usize> {
    let count: usize = Input::new()
        .with_prompt(prompt)
        .default(1)
        .validate_with(|n: &usize| -> Result<(), String> {
            if (1..=MAX_IMAGES).contains(n) {
                Ok(())
            } else {
                Err(format!("Enter a number from 1 to {}", MAX_IMAGES))
            }
        })
        .interact_text()?;
    Ok(count)
}

/// Run `work` while a spinner is shown.
fn with_spinner<R>(message: &str, work: impl FnOnce() -> R) -> Result<R> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    let out = work();
    spinner.finish_and_clear();
    Ok(out)
}

fn upload<T: Transport>(disk: &DiskClient<T>, folder: &str, images: &[ImageInfo]) -> Result<Vec<ResultRecord>> {
    let bar = ProgressBar::new(images.len() as u64);
    bar.set_style(ProgressStyle::with_template("Uploading [{bar:30}] {pos}/{len} {msg}")?.progress_chars("=> "));
    Ok(upload_images(disk, folder, images, &bar))
}

/// True when `err` comes from a prompt the user interrupted (Ctrl-C / EOF).
pub fn is_interrupt(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .map(|e| matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::UnexpectedEof))
            .unwrap_or(false)
    })
}
