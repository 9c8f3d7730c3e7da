//! The command interpreter driving a queue.
//!
//! Every command is checked against a model of the expected queue contents, and every queue
//! allocation is tracked so that leaks are reported once the queue is freed.

use std::{
    collections::VecDeque,
    io::{BufRead, Write},
    str::FromStr,
};

use anyhow::{Context, Result, anyhow, bail, ensure};
use strqueue::{Queue, QueueError, ops};
use tracing::{debug, error, warn};

use crate::tracker;

/// Longest value copied out by `rh`, unless changed with `option length`.
pub const DEFAULT_STRING_LENGTH: usize = 1024;

/// Upper bound accepted by `option length`.
pub const MAX_STRING_LENGTH: usize = 1 << 20;

/// Queues longer than this are shown by size only.
const SHOW_LIMIT: usize = 32;

const HELP: &str = "\
Commands:
  new                 Create a new queue, freeing the old one
  free                Free the queue
  ih <str> [n]        Insert <str> at the head, n times
  it <str> [n]        Insert <str> at the tail, n times
  rh [str]            Remove from the head, optionally comparing with <str>
  rhq                 Remove from the head without reporting the value
  size [n]            Print the queue size, optionally comparing with <n>
  reverse             Reverse the queue
  sort                Sort the queue in ascending order
  show                Print the queue
  option fail <n>     Fail every n-th queue allocation (0 disables)
  option length <n>   Maximum length of strings removed by rh
  help                Show this message
  quit                Stop reading commands";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Fail,
    Length,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New,
    Free,
    InsertHead { value: String, count: usize },
    InsertTail { value: String, count: usize },
    RemoveHead { expected: Option<String> },
    RemoveHeadQuiet,
    Size { expected: Option<usize> },
    Reverse,
    Sort,
    Show,
    Set { setting: Setting, value: usize },
    Help,
    Quit,
}

fn parse_number(word: &str) -> Result<usize> {
    word.parse()
        .with_context(|| format!("'{word}' is not a valid number"))
}

impl FromStr for Setting {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "fail" => Ok(Setting::Fail),
            "length" => Ok(Setting::Length),
            _ => bail!("unknown option '{name}'"),
        }
    }
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = words.split_first() else {
            bail!("empty command");
        };

        let command = match (name, args) {
            ("new", []) => Command::New,
            ("free", []) => Command::Free,
            ("ih", [value]) => Command::InsertHead {
                value: value.to_string(),
                count: 1,
            },
            ("ih", [value, count]) => Command::InsertHead {
                value: value.to_string(),
                count: parse_number(count)?,
            },
            ("it", [value]) => Command::InsertTail {
                value: value.to_string(),
                count: 1,
            },
            ("it", [value, count]) => Command::InsertTail {
                value: value.to_string(),
                count: parse_number(count)?,
            },
            ("rh", []) => Command::RemoveHead { expected: None },
            ("rh", [expected]) => Command::RemoveHead {
                expected: Some(expected.to_string()),
            },
            ("rhq", []) => Command::RemoveHeadQuiet,
            ("size", []) => Command::Size { expected: None },
            ("size", [expected]) => Command::Size {
                expected: Some(parse_number(expected)?),
            },
            ("reverse", []) => Command::Reverse,
            ("sort", []) => Command::Sort,
            ("show", []) => Command::Show,
            ("option", [setting, value]) => Command::Set {
                setting: setting.parse()?,
                value: parse_number(value)?,
            },
            ("help", []) => Command::Help,
            ("quit", []) => Command::Quit,
            (
                "new" | "free" | "ih" | "it" | "rh" | "rhq" | "size" | "reverse" | "sort"
                | "show" | "option" | "help" | "quit",
                _,
            ) => bail!("wrong number of arguments for '{name}', try 'help'"),
            _ => bail!("unknown command '{name}', try 'help'"),
        };

        Ok(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Copy)]
enum End {
    Head,
    Tail,
}

pub struct Console<W> {
    out: W,
    queue: Option<Box<Queue>>,
    model: VecDeque<String>,
    string_length: usize,
    echo: bool,
    errors: usize,
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        tracker::reset();

        Console {
            out,
            queue: None,
            model: VecDeque::new(),
            string_length: DEFAULT_STRING_LENGTH,
            echo: false,
            errors: 0,
        }
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Run every command from `input`, then free the queue. Returns the number of errors.
    ///
    /// `source` names the input in diagnostics.
    pub fn run(&mut self, input: impl BufRead, source: &str) -> usize {
        let mut line_number = 0;

        for (index, line) in input.lines().enumerate() {
            line_number = index + 1;

            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    error!(source, line = line_number, "failed to read input: {err}");
                    self.errors += 1;
                    break;
                }
            };

            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match self.run_line(line) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(err) => self.report(source, line_number, &err),
            }
        }

        // Teardown problems are attributed to the last line read.
        if let Err(err) = self.finish() {
            self.report(source, line_number, &err);
        }

        self.errors
    }

    fn report(&mut self, source: &str, line_number: usize, err: &anyhow::Error) {
        self.errors += 1;
        error!(source, line = line_number, "{err:#}");
        // Nothing more can be done if the output itself is broken.
        let _ = writeln!(self.out, "ERROR: {err:#} ({source}:{line_number})");
    }

    /// Parse and execute one command, then check the queue against the model.
    pub fn run_line(&mut self, line: &str) -> Result<Flow> {
        if self.echo {
            writeln!(self.out, "cmd> {line}")?;
        }

        let command: Command = line.parse()?;
        debug!(?command, "executing");

        let flow = self.execute(command)?;
        self.verify()?;

        Ok(flow)
    }

    fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::New => self.new_queue()?,
            Command::Free => {
                self.free_queue()?;
                self.show()?;
            }
            Command::InsertHead { value, count } => self.insert(End::Head, &value, count)?,
            Command::InsertTail { value, count } => self.insert(End::Tail, &value, count)?,
            Command::RemoveHead { expected } => self.remove(true, expected.as_deref())?,
            Command::RemoveHeadQuiet => self.remove(false, None)?,
            Command::Size { expected } => {
                let size = ops::size(self.queue.as_deref());
                writeln!(self.out, "Queue size = {size}")?;
                if let Some(expected) = expected {
                    ensure!(size == expected, "queue size is {size}, expected {expected}");
                }
            }
            Command::Reverse => {
                if self.queue.is_none() {
                    warn!("reversing without a queue");
                }
                ops::reverse(self.queue.as_deref_mut());
                self.model.make_contiguous().reverse();
                self.show()?;
            }
            Command::Sort => {
                if self.queue.is_none() {
                    warn!("sorting without a queue");
                }
                ops::sort(self.queue.as_deref_mut());
                self.model.make_contiguous().sort();
                self.show()?;
            }
            Command::Show => self.show()?,
            Command::Set { setting, value } => match setting {
                Setting::Fail => tracker::set_fail_every(value),
                Setting::Length => {
                    ensure!(
                        value <= MAX_STRING_LENGTH,
                        "string length {value} is larger than {MAX_STRING_LENGTH}"
                    );
                    self.string_length = value;
                }
            },
            Command::Help => writeln!(self.out, "{HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    fn new_queue(&mut self) -> Result<()> {
        self.free_queue()?;

        let (queue, injected) = tracker::tracked(Queue::try_new_boxed);
        match queue {
            Ok(queue) => self.queue = Some(queue),
            Err(err) => self.tolerate("creating the queue", err, injected)?,
        }

        self.show()
    }

    fn free_queue(&mut self) -> Result<()> {
        let queue = self.queue.take();
        tracker::tracked(|| ops::destroy(queue));
        self.model.clear();

        let live = tracker::live_blocks();
        ensure!(live == 0, "{live} blocks still allocated after freeing the queue");

        Ok(())
    }

    fn insert(&mut self, end: End, value: &str, count: usize) -> Result<()> {
        let queue = self
            .queue
            .as_deref_mut()
            .ok_or(QueueError::InvalidQueue)
            .context("cannot insert, run 'new' first")?;

        for _ in 0..count {
            let (result, injected) = tracker::tracked(|| match end {
                End::Head => queue.insert_head(value),
                End::Tail => queue.insert_tail(value),
            });

            if let Err(err) = result {
                return self.tolerate(&format!("inserting {value:?}"), err, injected);
            }

            match end {
                End::Head => self.model.push_front(value.to_owned()),
                End::Tail => self.model.push_back(value.to_owned()),
            }
        }

        self.show()
    }

    fn remove(&mut self, report: bool, expected: Option<&str>) -> Result<()> {
        let queue = self
            .queue
            .as_deref_mut()
            .ok_or(QueueError::InvalidQueue)
            .context("cannot remove, run 'new' first")?;

        let capacity = self
            .string_length
            .checked_add(1)
            .context("string length too large")?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .context("cannot allocate the removal buffer")?;
        buf.resize(capacity, 0u8);
        let (result, _) = tracker::tracked(|| {
            if report {
                queue.remove_head(Some(&mut buf[..]))
            } else {
                queue.remove_head(None)
            }
        });
        result.context("cannot remove")?;

        let modeled = self
            .model
            .pop_front()
            .ok_or_else(|| anyhow!("removed an element that should not exist"))?;

        if report {
            let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
            let removed = &buf[..len];
            writeln!(
                self.out,
                "Removed {} from queue",
                String::from_utf8_lossy(removed)
            )?;

            let want = expected.unwrap_or(&modeled).as_bytes();
            let want = &want[..want.len().min(self.string_length)];
            ensure!(
                removed == want,
                "removed {:?}, expected {:?}",
                String::from_utf8_lossy(removed),
                String::from_utf8_lossy(want)
            );
        }

        self.show()
    }

    /// Accept an allocation failure if one was injected, otherwise turn it into an error.
    fn tolerate(&mut self, what: &str, err: QueueError, injected: usize) -> Result<()> {
        if err == QueueError::AllocationFailure && injected > 0 {
            warn!("{what} failed: {err} (injected)");
            writeln!(self.out, "{what} failed: allocation failure injected")?;
            return Ok(());
        }

        Err(anyhow!(err).context(format!("{what} failed")))
    }

    fn show(&mut self) -> Result<()> {
        match self.queue.as_deref() {
            None => writeln!(self.out, "q = NULL")?,
            Some(queue) if queue.size() > SHOW_LIMIT => {
                writeln!(self.out, "q = [{} elements]", queue.size())?
            }
            Some(queue) => writeln!(self.out, "q = {queue:?}")?,
        }
        Ok(())
    }

    /// Compare the queue with the model.
    fn verify(&self) -> Result<()> {
        let size = ops::size(self.queue.as_deref());
        ensure!(
            size == self.model.len(),
            "queue has {size} elements, expected {}",
            self.model.len()
        );

        if let Some(queue) = self.queue.as_deref() {
            let actual = format!("{queue:?}");
            let expected = format!("{:?}", self.model);
            ensure!(actual == expected, "queue is {actual}, expected {expected}");
        }

        Ok(())
    }

    /// Free the queue left over at the end of the input and check for leaks.
    fn finish(&mut self) -> Result<()> {
        if self.queue.is_some() {
            debug!("freeing queue at end of input");
        }
        self.free_queue()
    }
}
