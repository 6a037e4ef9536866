use crate::audio::Bus;
use crate::scene::ListenerPose;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn is_quit(&self) -> bool {
        matches!(self.name.as_str(), "quit" | "exit")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// What the slash commands drive.
pub trait TransportHandler {
    fn play(&mut self) -> Result<(), String>;
    fn pause(&mut self) -> Result<(), String>;
    fn stop(&mut self) -> Result<(), String>;
    fn skip_next(&mut self) -> Result<(), String>;
    fn skip_prev(&mut self) -> Result<(), String>;
    fn skip_to(&mut self, index: usize) -> Result<(), String>;
    /// Returns the level actually applied
    fn set_level(&mut self, bus: Bus, level: f32) -> Result<f32, String>;
    fn set_ambient(&mut self, enabled: bool) -> Result<(), String>;
    fn move_listener(&mut self, pose: ListenerPose) -> Result<(), String>;
    /// Returns the scene's title
    fn select_scene(&mut self, id: &str) -> Result<String, String>;
    fn list_scenes(&self) -> Vec<String>;
    fn help(&self) -> Vec<String>;
}

pub struct CommandProcessor {
    commands: HashMap<String, String>,
}

impl CommandProcessor {
    pub fn new() -> Self {
        let mut commands = HashMap::new();
        commands.insert("play".to_string(), "Play or resume".to_string());
        commands.insert("pause".to_string(), "Pause the current segment".to_string());
        commands.insert("stop".to_string(), "Stop dialog and ambient".to_string());
        commands.insert("next".to_string(), "Skip to the next segment".to_string());
        commands.insert("prev".to_string(), "Skip to the previous segment".to_string());
        commands.insert("goto".to_string(), "Jump to segment N (1-based)".to_string());
        commands.insert(
            "ambient".to_string(),
            "Set ambient level (0-100), or turn it on/off".to_string(),
        );
        commands.insert("dialog".to_string(), "Set dialog level (0-100)".to_string());
        commands.insert(
            "move".to_string(),
            "Move the listener (x z [heading in degrees])".to_string(),
        );
        commands.insert("scene".to_string(), "Load a scene by id".to_string());
        commands.insert("scenes".to_string(), "List available scenes".to_string());
        commands.insert("help".to_string(), "Show available commands".to_string());
        commands.insert("quit".to_string(), "Exit the application".to_string());

        Self { commands }
    }

    pub fn parse(&self, input: &str) -> Result<Command, String> {
        let input = input.trim();

        let Some(body) = input.strip_prefix('/') else {
            return Err("Not a command (must start with /)".to_string());
        };

        let parts: Vec<&str> = body.split_whitespace().collect();
        if parts.is_empty() {
            return Err("Empty command".to_string());
        }

        let name = parts[0].to_lowercase();
        let args = parts[1..].iter().map(|s| s.to_string()).collect();

        Ok(Command { name, args })
    }

    pub fn execute<H: TransportHandler>(
        &self,
        input: &str,
        handler: &mut H,
    ) -> Result<String, String> {
        let cmd = self.parse(input)?;

        match cmd.name.as_str() {
            "play" => {
                handler.play()?;
                Ok("Playing".to_string())
            }
            "pause" => {
                handler.pause()?;
                Ok("Paused".to_string())
            }
            "stop" => {
                handler.stop()?;
                Ok("Stopped".to_string())
            }
            "next" => {
                handler.skip_next()?;
                Ok("Next segment".to_string())
            }
            "prev" => {
                handler.skip_prev()?;
                Ok("Previous segment".to_string())
            }
            "goto" => {
                let number: usize = cmd
                    .args
                    .first()
                    .ok_or_else(|| "Missing segment number".to_string())?
                    .parse()
                    .map_err(|_| "Segment number must be a positive integer".to_string())?;
                if number == 0 {
                    return Err("Segments are numbered from 1".to_string());
                }
                handler.skip_to(number - 1)?;
                Ok(format!("Jumping to segment {}", number))
            }
            "ambient" => match cmd.args.first().map(String::as_str) {
                None => Err("Missing ambient level".to_string()),
                Some("on") => {
                    handler.set_ambient(true)?;
                    Ok("Ambient on".to_string())
                }
                Some("off") => {
                    handler.set_ambient(false)?;
                    Ok("Ambient off".to_string())
                }
                Some(level) => {
                    let applied = handler.set_level(Bus::Ambient, parse_level(level)?)?;
                    Ok(format!("Ambient level {:.0}", applied * 100.0))
                }
            },
            "dialog" => {
                let level = cmd
                    .args
                    .first()
                    .ok_or_else(|| "Missing dialog level".to_string())?;
                let applied = handler.set_level(Bus::Dialog, parse_level(level)?)?;
                Ok(format!("Dialog level {:.0}", applied * 100.0))
            }
            "move" => {
                if cmd.args.len() < 2 {
                    return Err("Missing listener coordinates (need x z)".to_string());
                }
                let x: f32 = cmd.args[0]
                    .parse()
                    .map_err(|_| "X coordinate must be a number".to_string())?;
                let z: f32 = cmd.args[1]
                    .parse()
                    .map_err(|_| "Z coordinate must be a number".to_string())?;
                let degrees: f32 = match cmd.args.get(2) {
                    Some(heading) => heading
                        .parse()
                        .map_err(|_| "Heading must be a number of degrees".to_string())?,
                    None => 0.0,
                };

                handler.move_listener(ListenerPose::new(x, z, degrees.to_radians()))?;
                Ok(format!("Listener at ({}, {}) facing {}°", x, z, degrees))
            }
            "scene" => {
                let id = cmd.args.first().ok_or_else(|| "Missing scene id".to_string())?;
                let title = handler.select_scene(id)?;
                Ok(format!("Loaded {}", title))
            }
            "scenes" => {
                let scenes = handler.list_scenes();
                if scenes.is_empty() {
                    return Ok("No scenes in the catalog".to_string());
                }

                let mut result = String::from("Scenes:");
                for scene in scenes {
                    result.push_str(&format!("\n  - {}", scene));
                }
                Ok(result)
            }
            "help" => {
                let commands = handler.help();
                let mut result = String::from("Available commands:");

                for cmd in commands {
                    result.push_str(&format!("\n  {}", cmd));
                }

                Ok(result)
            }
            "quit" | "exit" => Ok("Quitting...".to_string()),
            _ => Err(format!("Unknown command: /{}", cmd.name)),
        }
    }

    /// Command names with their descriptions, sorted by name
    pub fn get_commands(&self) -> Vec<(String, String)> {
        let mut commands: Vec<_> = self
            .commands
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        commands.sort();
        commands
    }
}

impl Default for CommandProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentage 0-100 to a bus level.
fn parse_level(input: &str) -> Result<f32, String> {
    let percent: u8 = input
        .parse()
        .map_err(|_| "Level must be a number between 0-100".to_string())?;
    if percent > 100 {
        return Err("Level must be a number between 0-100".to_string());
    }
    Ok(percent as f32 / 100.0)
}
