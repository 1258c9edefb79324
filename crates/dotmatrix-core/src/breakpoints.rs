use std::fmt;

use crate::cpu::RegisterBank;

/// Condition evaluated against the registers when the address matches.
pub type Predicate = Box<dyn Fn(&RegisterBank) -> bool + Send + Sync>;

pub struct Breakpoint {
    pub id: u32,
    pub enabled: bool,
    pub addr: u16,
    pub message: Option<String>,
    condition: Option<Predicate>,
}

impl Breakpoint {
    pub fn has_condition(&self) -> bool {
        self.condition.is_some()
    }

    pub fn matches(&self, pc: u16, regs: &RegisterBank) -> bool {
        self.enabled && self.addr == pc && self.condition.as_ref().is_none_or(|cond| cond(regs))
    }
}

impl fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breakpoint")
            .field("id", &self.id)
            .field("enabled", &self.enabled)
            .field("addr", &format_args!("{:#06X}", self.addr))
            .field("conditional", &self.has_condition())
            .field("message", &self.message)
            .finish()
    }
}

/// Execution breakpoints consulted at every instruction boundary.
#[derive(Debug, Default)]
pub struct BreakpointSet {
    breakpoints: Vec<Breakpoint>,
    next_id: u32,
    armed: bool,
    suspended: bool,
}

impl BreakpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Break whenever execution reaches `addr`.
    pub fn add(&mut self, addr: u16) -> u32 {
        self.insert(addr, None)
    }

    /// Break at `addr` only when `condition` holds.
    pub fn add_when<F>(&mut self, addr: u16, condition: F) -> u32
    where
        F: Fn(&RegisterBank) -> bool + Send + Sync + 'static,
    {
        self.insert(addr, Some(Box::new(condition)))
    }

    fn insert(&mut self, addr: u16, condition: Option<Predicate>) -> u32 {
        self.next_id += 1;
        let id = self.next_id;
        self.breakpoints.push(Breakpoint {
            id,
            enabled: true,
            addr,
            message: None,
            condition,
        });
        self.recompute_fast_path();
        id
    }

    pub fn set_message(&mut self, id: u32, message: impl Into<String>) -> bool {
        match self.breakpoints.iter_mut().find(|bp| bp.id == id) {
            Some(bp) => {
                bp.message = Some(message.into());
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: u32) -> bool {
        let before = self.breakpoints.len();
        self.breakpoints.retain(|bp| bp.id != id);
        self.recompute_fast_path();
        self.breakpoints.len() != before
    }

    pub fn set_enabled(&mut self, id: u32, enabled: bool) -> bool {
        let found = match self.breakpoints.iter_mut().find(|bp| bp.id == id) {
            Some(bp) => {
                bp.enabled = enabled;
                true
            }
            None => false,
        };
        self.recompute_fast_path();
        found
    }

    pub fn clear(&mut self) {
        self.breakpoints.clear();
        self.armed = false;
    }

    pub fn get(&self, id: u32) -> Option<&Breakpoint> {
        self.breakpoints.iter().find(|bp| bp.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    pub fn set_suspended(&mut self, value: bool) {
        self.suspended = value;
    }

    pub fn suspended(&self) -> bool {
        self.suspended
    }

    /// Id of the first enabled breakpoint at `pc` whose condition holds.
    pub fn check(&self, pc: u16, regs: &RegisterBank) -> Option<u32> {
        if self.suspended || !self.armed {
            return None;
        }
        self.breakpoints
            .iter()
            .find(|bp| bp.matches(pc, regs))
            .map(|bp| bp.id)
    }

    fn recompute_fast_path(&mut self) {
        self.armed = self.breakpoints.iter().any(|bp| bp.enabled);
    }
}
