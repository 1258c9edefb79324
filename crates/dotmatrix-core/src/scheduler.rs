//! Dedicated execution thread that owns a [`GameBoy`] and runs it under
//! control of Resume/Step/Break/Terminate commands.
//!
//! Nothing outside the thread touches the machine while it runs. The host
//! talks to it over two channels: commands in, [`Event`]s out. Frame pacing
//! is a third channel that the thread waits on between frames.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{self as cb, Receiver, Sender, select};
use log::{debug, warn};

use crate::error::{EmuError, Result};
use crate::gameboy::GameBoy;

const THREAD_NAME: &str = "dotmatrix-emu";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run until a breakpoint, fault or break request.
    Resume,
    /// Execute exactly one instruction, then stay broken.
    Step,
    /// Stop at the next instruction boundary, or cut a pacing wait short.
    Break,
    /// Exit the thread for good.
    Terminate,
}

#[derive(Debug)]
pub enum BreakReason {
    Breakpoint(u32),
    Step,
    Request,
    Fault(EmuError),
}

#[derive(Debug)]
pub enum Event {
    Paused { pc: u16, reason: BreakReason },
    Terminated,
}

/// Where the thread gets its frame-start signal from.
pub enum FramePacing {
    /// Never wait.
    Unlimited,
    /// Fixed-period ticker, e.g. `Duration::from_nanos(16_742_706)`.
    Ticker(Duration),
    /// One message per frame from a host-owned source such as a display
    /// refresh or audio callback.
    External(Receiver<()>),
}

enum Pacer {
    Unlimited,
    Ticker(Receiver<Instant>),
    External(Receiver<()>),
}

impl From<FramePacing> for Pacer {
    fn from(pacing: FramePacing) -> Self {
        match pacing {
            FramePacing::Unlimited => Pacer::Unlimited,
            FramePacing::Ticker(period) => Pacer::Ticker(cb::tick(period)),
            FramePacing::External(rx) => Pacer::External(rx),
        }
    }
}

enum Wait {
    Continue,
    Break,
    Terminate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Broken,
    Running,
}

struct Worker {
    gb: GameBoy,
    commands: Receiver<Command>,
    events: Sender<Event>,
    pacer: Pacer,
    frame_limit: bool,
    break_on_fault: bool,
}

impl Worker {
    fn run(mut self) -> GameBoy {
        let mut state = State::Broken;
        debug!("Emulation thread started (broken)");
        loop {
            match state {
                State::Broken => match self.commands.recv() {
                    Ok(Command::Resume) => {
                        debug!("Resuming at {:04X}", self.gb.pc());
                        state = State::Running;
                    }
                    Ok(Command::Step) => {
                        self.gb.step();
                        let reason = self.fault_reason().unwrap_or(BreakReason::Step);
                        self.pause(reason);
                    }
                    Ok(Command::Break) => {}
                    Ok(Command::Terminate) | Err(_) => break,
                },
                State::Running => {
                    match self.commands.try_recv() {
                        Ok(Command::Break) => {
                            self.pause(BreakReason::Request);
                            state = State::Broken;
                            continue;
                        }
                        Ok(Command::Terminate) | Err(cb::TryRecvError::Disconnected) => break,
                        Ok(Command::Resume | Command::Step) | Err(cb::TryRecvError::Empty) => {}
                    }

                    let info = self.gb.step();
                    if let Some(reason) = self.break_reason() {
                        self.pause(reason);
                        state = State::Broken;
                        continue;
                    }

                    if info.frame_complete && self.frame_limit {
                        match self.wait_for_frame() {
                            Wait::Continue => {}
                            Wait::Break => {
                                self.pause(BreakReason::Request);
                                state = State::Broken;
                            }
                            Wait::Terminate => break,
                        }
                    }
                }
            }
        }
        debug!("Emulation thread terminating");
        let _ = self.events.send(Event::Terminated);
        self.gb
    }

    fn fault_reason(&mut self) -> Option<BreakReason> {
        // Faults are logged where they are recorded.
        let fault = self.gb.take_fault()?;
        self.break_on_fault.then_some(BreakReason::Fault(fault))
    }

    fn break_reason(&mut self) -> Option<BreakReason> {
        if let Some(reason) = self.fault_reason() {
            return Some(reason);
        }
        self.gb.breakpoint_hit().map(BreakReason::Breakpoint)
    }

    fn pause(&mut self, reason: BreakReason) {
        let pc = self.gb.pc();
        debug!("Paused at {pc:04X}: {reason:?}");
        let _ = self.events.send(Event::Paused { pc, reason });
    }

    fn wait_for_frame(&mut self) -> Wait {
        let wait = match &self.pacer {
            Pacer::Unlimited => return Wait::Continue,
            Pacer::Ticker(rx) => self.wait_on(rx),
            Pacer::External(rx) => self.wait_on(rx),
        };
        match wait {
            Some(wait) => wait,
            None => {
                warn!("Frame pacing source disconnected, running unlimited");
                self.pacer = Pacer::Unlimited;
                Wait::Continue
            }
        }
    }

    /// Block for one pacing message. `None` means the source is gone.
    fn wait_on<T>(&self, pacing: &Receiver<T>) -> Option<Wait> {
        loop {
            select! {
                recv(pacing) -> msg => return msg.ok().map(|_| Wait::Continue),
                recv(self.commands) -> cmd => match cmd {
                    Ok(Command::Break) => return Some(Wait::Break),
                    Ok(Command::Terminate) | Err(_) => return Some(Wait::Terminate),
                    Ok(Command::Resume | Command::Step) => {}
                },
            }
        }
    }
}

/// Handle to a running emulation thread.
pub struct Scheduler {
    commands: Sender<Command>,
    events: Receiver<Event>,
    handle: Option<JoinHandle<GameBoy>>,
}

impl Scheduler {
    /// Move `gb` onto a new thread. It starts broken; send
    /// [`Command::Resume`] to run.
    pub fn spawn(gb: GameBoy, pacing: FramePacing) -> Result<Self> {
        let (cmd_tx, cmd_rx) = cb::unbounded();
        let (event_tx, event_rx) = cb::unbounded();
        let config = gb.config();
        let worker = Worker {
            frame_limit: config.frame_limit,
            break_on_fault: config.break_on_fault,
            gb,
            commands: cmd_rx,
            events: event_tx,
            pacer: pacing.into(),
        };
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(EmuError::ThreadSpawn)?;
        Ok(Self {
            commands: cmd_tx,
            events: event_rx,
            handle: Some(handle),
        })
    }

    /// Queue a command. Commands sent after termination are dropped.
    pub fn send(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            debug!("Command {cmd:?} dropped, emulation thread has exited");
        }
    }

    pub fn resume(&self) {
        self.send(Command::Resume);
    }

    pub fn step(&self) {
        self.send(Command::Step);
    }

    pub fn request_break(&self) {
        self.send(Command::Break);
    }

    pub fn terminate(&self) {
        self.send(Command::Terminate);
    }

    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Terminate the thread and take the machine back. `None` if the
    /// thread panicked.
    pub fn join(mut self) -> Option<GameBoy> {
        self.terminate();
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(gb) => Some(gb),
            Err(_) => {
                warn!("Emulation thread panicked");
                None
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.commands.send(Command::Terminate);
            let _ = handle.join();
        }
    }
}
