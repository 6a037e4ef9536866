pub mod catalog;
pub mod config;
pub mod session;

use crate::audio::Bus;
use crate::error::{Error, Result};
use crate::scene::ListenerPose;
use crate::ui::{CommandProcessor, TransportHandler};
use catalog::{Catalog, CatalogEntry};
use config::EngineConfig;
use log::info;
use session::Session;

/// Main application struct that coordinates all components
pub struct App {
    config: EngineConfig,
    catalog: Catalog,
    session: Session,
    current_scene: Option<String>,
}

impl App {
    /// Creates the application and starts its session. Must run inside a
    /// tokio runtime.
    pub fn new(config: EngineConfig, catalog: Catalog) -> Self {
        let session = Session::start(&config);
        Self::with_session(config, catalog, session)
    }

    pub fn with_session(config: EngineConfig, catalog: Catalog, session: Session) -> Self {
        Self {
            config,
            catalog,
            session,
            current_scene: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Catalog entry of the scene last loaded
    pub fn current_scene(&self) -> Option<&CatalogEntry> {
        let id = self.current_scene.as_deref()?;
        self.catalog.get(id).map(|(_, entry)| entry)
    }

    /// Build the scene from the catalog and hand it to the engine
    pub fn load_scene(&mut self, id: &str) -> Result<&CatalogEntry> {
        let scene = self.catalog.scene(id, &self.config)?;
        info!("Selecting scene {}", id);
        self.session.handle().load_scene(scene)?;
        self.current_scene = Some(id.to_string());

        let (_, entry) = self
            .catalog
            .get(id)
            .ok_or_else(|| Error::Catalog(format!("No scene named {}", id)))?;
        Ok(entry)
    }

    /// Put the listener where a freshly loaded scene wants them.
    pub fn place_listener(&self, start: Option<ListenerPose>) -> ListenerPose {
        let pose = start.unwrap_or(self.config.listener_start);
        self.session.handle().set_listener_pose(pose);
        pose
    }

    pub async fn shutdown(self) -> Result<()> {
        self.session.shutdown().await
    }
}

impl TransportHandler for App {
    fn play(&mut self) -> std::result::Result<(), String> {
        self.session.handle().play().map_err(|e| e.to_string())
    }

    fn pause(&mut self) -> std::result::Result<(), String> {
        self.session.handle().pause().map_err(|e| e.to_string())
    }

    fn stop(&mut self) -> std::result::Result<(), String> {
        self.session.handle().stop().map_err(|e| e.to_string())
    }

    fn skip_next(&mut self) -> std::result::Result<(), String> {
        self.session.handle().skip_next().map_err(|e| e.to_string())
    }

    fn skip_prev(&mut self) -> std::result::Result<(), String> {
        self.session.handle().skip_prev().map_err(|e| e.to_string())
    }

    fn skip_to(&mut self, index: usize) -> std::result::Result<(), String> {
        let len = self
            .current_scene()
            .map(|entry| entry.segments.len())
            .ok_or_else(|| "No scene loaded".to_string())?;
        if index >= len {
            return Err(format!("Scene has {} segments", len));
        }
        self.session.handle().skip_to(index).map_err(|e| e.to_string())
    }

    fn set_level(&mut self, bus: Bus, level: f32) -> std::result::Result<f32, String> {
        Ok(self.session.handle().set_bus_level(bus, level))
    }

    fn set_ambient(&mut self, enabled: bool) -> std::result::Result<(), String> {
        let handle = self.session.handle();
        let result = if enabled {
            handle.start_ambient()
        } else {
            handle.stop_ambient()
        };
        result.map_err(|e| e.to_string())
    }

    fn move_listener(&mut self, pose: ListenerPose) -> std::result::Result<(), String> {
        if self.session.handle().set_listener_pose(pose) {
            Ok(())
        } else {
            Err("Position and heading must be finite numbers".to_string())
        }
    }

    fn select_scene(&mut self, id: &str) -> std::result::Result<String, String> {
        self.load_scene(id)
            .map(|entry| entry.title.clone())
            .map_err(|e| e.to_string())
    }

    fn list_scenes(&self) -> Vec<String> {
        self.catalog
            .entries()
            .iter()
            .map(|entry| {
                let mut line = format!("{}  {}", entry.id, entry.title);
                if !entry.location.is_empty() {
                    line.push_str(&format!(" ({})", entry.location));
                }
                line.push_str(&format!(", {} segments", entry.segments.len()));
                line
            })
            .collect()
    }

    fn help(&self) -> Vec<String> {
        CommandProcessor::new()
            .get_commands()
            .into_iter()
            .map(|(name, description)| format!("/{:<8} {}", name, description))
            .collect()
    }
}
