use crate::config::{Config, SwitchSource};
use crate::error::TvError;
use crate::hardware::{Backlight, Framebuffer, RaspiGpio, SwitchProvider, SysfsGpio};
use crate::input::{GestureRecognizer, touch};
use crate::messages::{Gesture, PowerState, SwitchEdge, TouchEvent};
use crate::services::{ChildReaper, PlaybackSupervisor, SwitchMonitor, TransitionEffect};

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const TOUCH_QUEUE: usize = 64;

/// Single owner of the power state and every component it drives.
///
/// Each tick runs in a fixed order: reap children, poll the switch, drain touch
/// input, fire an expired single tap. Every transition completes before the next
/// step looks at the state.
pub struct App {
    state: PowerState,
    switch: SwitchMonitor,
    backlight: Box<dyn Backlight>,
    framebuffer: Framebuffer,
    supervisor: PlaybackSupervisor,
    transition: TransitionEffect,
    reaper: ChildReaper,
    gestures: GestureRecognizer,
    touch_rx: mpsc::Receiver<TouchEvent>,
    touch_task: Option<JoinHandle<()>>,
    tick: Duration,
    restart_backoff: Duration,
    last_start: Option<Instant>,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let switch: Box<dyn SwitchProvider> = match config.switch_source {
            SwitchSource::RaspiGpio => {
                Box::new(RaspiGpio::new(&config.gpio_command, config.switch_pin))
            }
            SwitchSource::Sysfs => Box::new(SysfsGpio::new(config.switch_pin)),
        };
        let backlight = Box::new(RaspiGpio::new(&config.gpio_command, config.backlight_pin));
        let (touch_rx, touch_task) = Self::setup_touch_monitoring(config);

        let mut app = Self::with_hardware(config, switch, backlight, touch_rx);
        app.touch_task = Some(touch_task);
        app
    }

    pub fn with_hardware(
        config: &Config,
        switch: Box<dyn SwitchProvider>,
        backlight: Box<dyn Backlight>,
        touch_rx: mpsc::Receiver<TouchEvent>,
    ) -> Self {
        Self {
            state: PowerState::Off,
            switch: SwitchMonitor::new(switch, config.switch_poll()),
            backlight,
            framebuffer: Framebuffer::new(&config.fb_device, config.frame_len()),
            supervisor: PlaybackSupervisor::new(config),
            transition: TransitionEffect::new(config),
            reaper: ChildReaper::new(),
            gestures: GestureRecognizer::new(config.double_tap_window()),
            touch_rx,
            touch_task: None,
            tick: config.tick(),
            restart_backoff: config.restart_backoff(),
            last_start: None,
        }
    }

    /// Tick until `shutdown` resolves, then stop playback and release the hardware
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        self.startup().await;

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => self.tick().await,
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Apply the switch position found at boot
    async fn startup(&mut self) {
        if self.switch.init().await {
            self.power_on().await;
        } else {
            self.power_off().await;
        }
    }

    async fn shutdown(&mut self) {
        self.supervisor.stop(&mut self.reaper).await;
        self.framebuffer.clear();
        if let Some(task) = self.touch_task.take() {
            task.abort();
        }
        self.touch_rx.close();
        if self.reaper.pending() > 0 {
            tracing::debug!("{} children still unreaped at exit", self.reaper.pending());
        }
    }

    async fn tick(&mut self) {
        self.reap_children().await;

        match self.switch.poll(Instant::now()).await {
            Some(SwitchEdge::BecameOn) if self.state == PowerState::Off => self.power_on().await,
            Some(SwitchEdge::BecameOff) if self.state != PowerState::Off => {
                self.power_off().await
            }
            _ => {}
        }

        if self.state == PowerState::Off {
            return;
        }

        while let Ok(event) = self.touch_rx.try_recv() {
            if let Some(gesture) = self.gestures.on_event(event) {
                self.apply_gesture(gesture).await;
            }
        }

        if let Some(gesture) = self.gestures.poll_expired(Instant::now()) {
            self.apply_gesture(gesture).await;
        }
    }

    async fn reap_children(&mut self) {
        if let Some(status) = self.reaper.reap(&mut self.supervisor) {
            match self.state {
                PowerState::Playing => tracing::warn!("Player died ({}), restarting", status),
                PowerState::Paused => tracing::warn!(
                    "Player died while paused ({}); the next tap starts a new item",
                    status
                ),
                PowerState::Off => tracing::debug!("Player exited: {}", status),
            }
        }

        if self.state == PowerState::Playing
            && !self.supervisor.is_tracked()
            && self.restart_due()
        {
            self.start_playback().await;
        }
    }

    fn restart_due(&self) -> bool {
        self.last_start
            .is_none_or(|at| at.elapsed() >= self.restart_backoff)
    }

    async fn start_playback(&mut self) {
        self.last_start = Some(Instant::now());
        match self.supervisor.start(&mut self.reaper).await {
            Ok(_) => {}
            Err(TvError::NoMedia { dir }) => tracing::warn!("no videos found in {}", dir.display()),
            Err(e) => tracing::error!("Failed to start playback: {}", e),
        }
    }

    async fn power_on(&mut self) {
        self.backlight.set(true).await;
        self.framebuffer.clear();
        self.start_playback().await;
        self.state = PowerState::Playing;
        // Touches made while dark were never meant as gestures.
        let mut stale = 0;
        while self.touch_rx.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            tracing::debug!("Discarded {} touch events queued while off", stale);
        }
        self.gestures.disarm();
        tracing::info!("power ON");
    }

    async fn power_off(&mut self) {
        self.supervisor.stop(&mut self.reaper).await;
        self.framebuffer.clear();
        self.backlight.set(false).await;
        self.state = PowerState::Off;
        self.gestures.disarm();
        tracing::info!("power OFF");
    }

    async fn apply_gesture(&mut self, gesture: Gesture) {
        tracing::debug!("Gesture {:?} in state {:?}", gesture, self.state);
        match gesture {
            Gesture::SingleTap => self.toggle_pause().await,
            Gesture::DoubleTap => self.next_item().await,
        }
    }

    async fn toggle_pause(&mut self) {
        match self.state {
            PowerState::Playing => {
                if !self.supervisor.pause() {
                    tracing::debug!("No live player to freeze");
                }
                self.state = PowerState::Paused;
                tracing::info!("pause");
            }
            PowerState::Paused => {
                if !self.supervisor.resume() {
                    tracing::debug!("No frozen player to continue, starting a new item");
                    self.start_playback().await;
                }
                self.state = PowerState::Playing;
                match self.supervisor.current_input() {
                    Some(input) => tracing::info!("resume: {}", input.display()),
                    None => tracing::info!("resume"),
                }
            }
            PowerState::Off => {}
        }
    }

    async fn next_item(&mut self) {
        if self.state != PowerState::Playing {
            tracing::debug!("Ignoring next item while {:?}", self.state);
            return;
        }

        self.supervisor.stop(&mut self.reaper).await;
        self.transition.run(&self.framebuffer, &mut self.reaper).await;
        self.start_playback().await;
        match self.supervisor.current_input() {
            Some(input) => tracing::info!("next: {}", input.display()),
            None => tracing::info!("next"),
        }
    }

    fn setup_touch_monitoring(config: &Config) -> (mpsc::Receiver<TouchEvent>, JoinHandle<()>) {
        let (touch_tx, touch_rx) = mpsc::channel(TOUCH_QUEUE);
        let path = config.touch_device.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = touch::monitor_touch(path, touch_tx).await {
                tracing::error!("{:#}; continuing without touch gestures", e);
            }
        });
        (touch_rx, task)
    }
}
