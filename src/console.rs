//! Interactive console input
//!
//! All prompting happens here, before any network call is made. Commands get
//! plain request structs built by these collectors.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::chat::GroupRef;
use crate::error::{Error, Result};

/// Line-oriented user interaction.
pub trait Prompter {
    /// Print a prompt and read one line (without the trailing newline).
    fn ask(&mut self, prompt: &str) -> Result<String>;

    /// Print an informational line.
    fn say(&mut self, line: &str);
}

/// Prompter over the process stdin/stdout.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(Error::Cancelled);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn say(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// Prompter fed from a fixed list of answers. Running out of answers is `Cancelled`.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<String>,
    said: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
            said: Vec::new(),
        }
    }

    pub fn asked(&self) -> &[String] {
        &self.asked
    }

    pub fn said(&self) -> &[String] {
        &self.said
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        self.asked.push(prompt.to_string());
        self.answers.pop_front().ok_or(Error::Cancelled)
    }

    fn say(&mut self, line: &str) {
        self.said.push(line.to_string());
    }
}

/// Main menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Login,
    Scrape,
    Add,
    Post,
    Logout,
    Exit,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 6] = [
        MenuChoice::Login,
        MenuChoice::Scrape,
        MenuChoice::Add,
        MenuChoice::Post,
        MenuChoice::Logout,
        MenuChoice::Exit,
    ];

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::Login),
            "2" => Some(MenuChoice::Scrape),
            "3" => Some(MenuChoice::Add),
            "4" => Some(MenuChoice::Post),
            "5" => Some(MenuChoice::Logout),
            "6" => Some(MenuChoice::Exit),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            MenuChoice::Login => "Login",
            MenuChoice::Scrape => "Scrape Users",
            MenuChoice::Add => "Add Members",
            MenuChoice::Post => "Post to Multiple Groups",
            MenuChoice::Logout => "Logout",
            MenuChoice::Exit => "Exit",
        }
    }
}

pub fn render_menu() -> String {
    let mut out = String::from("\nMain Menu:\n");
    for (idx, choice) in MenuChoice::ALL.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", idx + 1, choice.title()));
    }
    out
}

/// Ask until a known menu entry is typed.
pub fn ask_menu_choice<P: Prompter>(prompter: &mut P) -> Result<MenuChoice> {
    loop {
        let raw = prompter.ask(&format!("\nEnter your choice (1-{}): ", MenuChoice::ALL.len()))?;
        match MenuChoice::parse(&raw) {
            Some(choice) => return Ok(choice),
            None => prompter.say("❌ Invalid choice."),
        }
    }
}

/// Ask for a group link, @username or numeric id.
pub fn ask_group<P: Prompter>(prompter: &mut P, prompt: &str) -> Result<GroupRef> {
    loop {
        let raw = prompter.ask(prompt)?;
        match GroupRef::parse(&raw) {
            Some(group) => return Ok(group),
            None => prompter.say("❌ Not a valid group link, @username or numeric ID."),
        }
    }
}

/// Ask for the path of an existing file.
pub fn ask_existing_file<P: Prompter>(prompter: &mut P, prompt: &str) -> Result<PathBuf> {
    loop {
        let raw = prompter.ask(prompt)?;
        let path = PathBuf::from(raw.trim().trim_matches('"'));
        if !raw.trim().is_empty() && path.is_file() {
            return Ok(path);
        }
        prompter.say("❌ File not found. Please try again.");
    }
}

/// Ask for a non-empty secret such as a bot token.
pub fn ask_non_empty<P: Prompter>(prompter: &mut P, prompt: &str) -> Result<String> {
    loop {
        let raw = prompter.ask(prompt)?;
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
        prompter.say("❌ Value cannot be empty.");
    }
}

/// Yes/no question; anything but `y`/`yes` is no.
pub fn confirm<P: Prompter>(prompter: &mut P, prompt: &str) -> Result<bool> {
    let raw = prompter.ask(prompt)?;
    Ok(matches!(raw.trim().to_lowercase().as_str(), "y" | "yes"))
}
