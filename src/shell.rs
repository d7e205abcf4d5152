//! Interactive allocation shell
//!
//! Reads one command per line and allocates or frees named groups of buffers
//! on request, so memory can be grown and shrunk by hand or from a script:
//!
//! ```text
//! sleep <seconds>
//! alloc <id> <count> <size>
//! delete <id>
//! gc
//! mem-info
//! ```
//!
//! Every command is bracketed by `Executing <cmd> command...` and
//! `Executing <cmd> command... Done!`, including unknown ones.

use crate::util::resource::ResourceSnapshot;
use crate::worker::Buffer;
use crate::Result;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::thread;
use std::time::Duration;
use tracing::debug;

const SLEEP_USAGE: &str = "Error: syntax: sleep <# of seconds>";
const ALLOC_USAGE: &str = "Error: syntax: alloc <id> <# buffers> <size of buffer>";
const DELETE_USAGE: &str = "Error: syntax: delete <id>";

/// Named groups of buffers held by the shell
pub trait BufferStore {
    fn contains(&self, id: &str) -> bool;

    fn insert(&mut self, id: String, buffers: Vec<Buffer>);

    /// Remove and return the group, dropping it frees the memory
    fn remove(&mut self, id: &str) -> Option<Vec<Buffer>>;

    /// Number of groups
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held across every group
    fn held_bytes(&self) -> u64;
}

/// `BufferStore` backed by a `HashMap`
#[derive(Debug, Default)]
pub struct HashMapStore {
    groups: HashMap<String, Vec<Buffer>>,
}

impl HashMapStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BufferStore for HashMapStore {
    fn contains(&self, id: &str) -> bool {
        self.groups.contains_key(id)
    }

    fn insert(&mut self, id: String, buffers: Vec<Buffer>) {
        self.groups.insert(id, buffers);
    }

    fn remove(&mut self, id: &str) -> Option<Vec<Buffer>> {
        self.groups.remove(id)
    }

    fn len(&self) -> usize {
        self.groups.len()
    }

    fn held_bytes(&self) -> u64 {
        self.groups
            .values()
            .flat_map(|buffers| buffers.iter())
            .map(|b| b.size() as u64)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Sleep(u64),
    Alloc { id: String, count: usize, size: usize },
    Delete(String),
    Gc,
    MemInfo,
    Unknown,
}

impl Command {
    /// Parse a split line; `Err` carries the usage message to print
    fn parse(words: &[&str]) -> std::result::Result<Self, &'static str> {
        match words {
            ["sleep", rest @ ..] => match rest.first().map(|s| s.parse::<u64>()) {
                Some(Ok(secs)) => Ok(Command::Sleep(secs)),
                _ => Err(SLEEP_USAGE),
            },
            ["alloc", rest @ ..] => match rest {
                [id, count, size, ..] => match (count.parse::<usize>(), size.parse::<usize>()) {
                    (Ok(count), Ok(size)) => Ok(Command::Alloc {
                        id: id.to_string(),
                        count,
                        size,
                    }),
                    _ => Err(ALLOC_USAGE),
                },
                _ => Err(ALLOC_USAGE),
            },
            ["delete", rest @ ..] => match rest.first() {
                Some(id) => Ok(Command::Delete(id.to_string())),
                None => Err(DELETE_USAGE),
            },
            ["gc", ..] => Ok(Command::Gc),
            ["mem-info", ..] => Ok(Command::MemInfo),
            _ => Ok(Command::Unknown),
        }
    }
}

/// Line-oriented command interpreter over a `BufferStore`
pub struct Shell<S: BufferStore> {
    store: S,
    zero_fill: bool,
}

impl<S: BufferStore> Shell<S> {
    /// `zero_fill` commits the pages of every allocated buffer
    pub fn new(store: S, zero_fill: bool) -> Self {
        Self { store, zero_fill }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute every line of `input` until end of input
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> Result<()> {
        for line in input.lines() {
            self.execute(&line?, out)?;
            out.flush()?;
        }
        Ok(())
    }

    /// Execute one line; blank lines are ignored
    pub fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> Result<()> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let name = match words.first() {
            Some(name) => *name,
            None => return Ok(()),
        };

        writeln!(out, "Executing {} command...", name)?;
        match Command::parse(&words) {
            Ok(command) => self.apply(command, out)?,
            Err(usage) => writeln!(out, "{}", usage)?,
        }
        writeln!(out, "Executing {} command... Done!", name)?;
        Ok(())
    }

    fn apply<W: Write>(&mut self, command: Command, out: &mut W) -> Result<()> {
        match command {
            Command::Sleep(secs) => thread::sleep(Duration::from_secs(secs)),
            Command::Alloc { id, count, size } => {
                if self.store.contains(&id) {
                    writeln!(out, "Error: id already in used")?;
                    return Ok(());
                }
                match self.allocate(count, size) {
                    Some(buffers) => {
                        debug!(id = %id, count, size, "allocated buffer group");
                        self.store.insert(id, buffers);
                    }
                    None => writeln!(
                        out,
                        "Error: cannot allocate {} buffers of {} bytes",
                        count, size
                    )?,
                }
            }
            Command::Delete(id) => match self.store.remove(&id) {
                Some(buffers) => {
                    debug!(id = %id, count = buffers.len(), "released buffer group");
                }
                None => writeln!(out, "Error: no such id")?,
            },
            // memory is returned to the allocator as soon as a group is dropped
            Command::Gc => {}
            Command::MemInfo => self.print_mem_info(out)?,
            Command::Unknown => writeln!(out, "unknown command")?,
        }
        Ok(())
    }

    /// All `count` buffers, or none if any allocation fails
    fn allocate(&self, count: usize, size: usize) -> Option<Vec<Buffer>> {
        let mut buffers = Vec::new();
        buffers.try_reserve_exact(count).ok()?;
        for _ in 0..count {
            buffers.push(Buffer::allocate(size, self.zero_fill).ok()?);
        }
        Some(buffers)
    }

    fn print_mem_info<W: Write>(&self, out: &mut W) -> Result<()> {
        const MB: u64 = 1_000_000;
        match ResourceSnapshot::take() {
            Some(snapshot) => {
                writeln!(out, "Resident memory (MBs): {}", snapshot.memory_rss_bytes / MB)?;
                writeln!(out, "Virtual memory (MBs): {}", snapshot.memory_vm_bytes / MB)?;
            }
            None => writeln!(out, "Resident memory (MBs): not available")?,
        }
        writeln!(out, "Held buffers (MBs): {}", self.store.held_bytes() / MB)?;
        writeln!(out, "Held ids: {}", self.store.len())?;
        Ok(())
    }
}
