//! Purpose: Parse argv-style host commands into typed `Command` values.
//! Exports: `Command`, `InsertPosition`, `COMMANDS`, `usage`.
//! Role: First stage of dispatch; arity and argument types are checked here.
//! Invariants: Parsing never touches the registry or the engine.
//! Invariants: Wrong arity is `Usage`; non-numeric numbers and NUL bytes are `Conversion`.
use crate::core::engine::InitFlags;
use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum InsertPosition {
    Before,
    #[default]
    After,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Init {
        root: String,
        loadpath: Option<String>,
        flags: InitFlags,
    },
    Close {
        token: String,
    },
    Save {
        token: String,
    },
    Load {
        token: String,
    },
    Get {
        token: String,
        path: String,
    },
    Set {
        token: String,
        path: String,
        value: String,
    },
    Setm {
        token: String,
        base: String,
        sub: Option<String>,
        value: String,
    },
    Insert {
        token: String,
        path: String,
        label: String,
        position: InsertPosition,
    },
    Mv {
        token: String,
        src: String,
        dst: String,
    },
    Rm {
        token: String,
        path: String,
    },
    Rename {
        token: String,
        src: String,
        label: String,
    },
    Match {
        token: String,
        path: String,
    },
    Span {
        token: String,
        path: String,
    },
    Handles,
}

pub struct CommandShape {
    pub name: &'static str,
    pub usage: &'static str,
    min_args: usize,
    max_args: usize,
}

const fn shape(
    name: &'static str,
    usage: &'static str,
    min_args: usize,
    max_args: usize,
) -> CommandShape {
    CommandShape {
        name,
        usage,
        min_args,
        max_args,
    }
}

pub const COMMANDS: &[CommandShape] = &[
    shape("init", "init root ?loadpath? ?flags?", 1, 3),
    shape("close", "close token", 1, 1),
    shape("save", "save token", 1, 1),
    shape("load", "load token", 1, 1),
    shape("get", "get token path", 2, 2),
    shape("set", "set token path value", 3, 3),
    shape("setm", "setm token base sub value", 4, 4),
    shape("insert", "insert token path label ?before?", 3, 4),
    shape("mv", "mv token src dst", 3, 3),
    shape("rm", "rm token path", 2, 2),
    shape("rename", "rename token src label", 3, 3),
    shape("match", "match token path", 2, 2),
    shape("span", "span token path", 2, 2),
    shape("handles", "handles", 0, 0),
];

/// Usage line for `name`, if it is a known command.
pub fn usage(name: &str) -> Option<&'static str> {
    find(name).map(|shape| shape.usage)
}

fn find(name: &str) -> Option<&'static CommandShape> {
    COMMANDS.iter().find(|shape| shape.name == name)
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init { .. } => "init",
            Command::Close { .. } => "close",
            Command::Save { .. } => "save",
            Command::Load { .. } => "load",
            Command::Get { .. } => "get",
            Command::Set { .. } => "set",
            Command::Setm { .. } => "setm",
            Command::Insert { .. } => "insert",
            Command::Mv { .. } => "mv",
            Command::Rm { .. } => "rm",
            Command::Rename { .. } => "rename",
            Command::Match { .. } => "match",
            Command::Span { .. } => "span",
            Command::Handles => "handles",
        }
    }

    /// Parse `name` plus its arguments (the command word excluded).
    pub fn parse<S: AsRef<str>>(name: &str, args: &[S]) -> Result<Command, Error> {
        let shape = find(name).ok_or_else(|| {
            let known: Vec<&str> = COMMANDS.iter().map(|shape| shape.name).collect();
            Error::new(ErrorKind::Usage)
                .with_message(format!("unknown command \"{name}\""))
                .with_detail(format!("must be one of: {}", known.join(", ")))
        })?;
        if args.len() < shape.min_args || args.len() > shape.max_args {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "wrong # args: should be \"{}\"",
                shape.usage
            )));
        }

        let mut words = Vec::with_capacity(args.len());
        for arg in args {
            let arg = arg.as_ref();
            if arg.contains('\0') {
                return Err(Error::new(ErrorKind::Conversion)
                    .with_message("argument contains a NUL byte")
                    .with_detail(shape.usage));
            }
            words.push(arg.to_string());
        }
        let mut words = words.into_iter();
        let mut next = || words.next().unwrap_or_default();

        let command = match shape.name {
            "init" => {
                let root = next();
                let loadpath = (args.len() >= 2).then(&mut next);
                let flags = match args.len() {
                    3 => parse_flags(&next())?,
                    _ => InitFlags::NONE,
                };
                Command::Init {
                    root,
                    loadpath,
                    flags,
                }
            }
            "close" => Command::Close { token: next() },
            "save" => Command::Save { token: next() },
            "load" => Command::Load { token: next() },
            "get" => Command::Get {
                token: next(),
                path: next(),
            },
            "set" => Command::Set {
                token: next(),
                path: next(),
                value: next(),
            },
            "setm" => {
                let token = next();
                let base = next();
                let sub = Some(next()).filter(|sub| !sub.is_empty());
                Command::Setm {
                    token,
                    base,
                    sub,
                    value: next(),
                }
            }
            "insert" => {
                let token = next();
                let path = next();
                let label = next();
                let position = match args.len() {
                    4 => parse_position(&next())?,
                    _ => InsertPosition::default(),
                };
                Command::Insert {
                    token,
                    path,
                    label,
                    position,
                }
            }
            "mv" => Command::Mv {
                token: next(),
                src: next(),
                dst: next(),
            },
            "rm" => Command::Rm {
                token: next(),
                path: next(),
            },
            "rename" => Command::Rename {
                token: next(),
                src: next(),
                label: next(),
            },
            "match" => Command::Match {
                token: next(),
                path: next(),
            },
            "span" => Command::Span {
                token: next(),
                path: next(),
            },
            _ => Command::Handles,
        };
        Ok(command)
    }
}

/// Flags are an unsigned integer, decimal or `0x` hexadecimal.
fn parse_flags(raw: &str) -> Result<InitFlags, Error> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => raw.parse::<u32>(),
    };
    parsed.map(InitFlags::from_bits).map_err(|err| {
        Error::new(ErrorKind::Conversion)
            .with_message(format!("expected integer but got \"{raw}\""))
            .with_detail("flags")
            .with_source(err)
    })
}

/// `before`/`after`, or an integer where non-zero means before.
fn parse_position(raw: &str) -> Result<InsertPosition, Error> {
    match raw {
        "before" => return Ok(InsertPosition::Before),
        "after" => return Ok(InsertPosition::After),
        _ => {}
    }
    raw.parse::<i64>()
        .map(|value| {
            if value != 0 {
                InsertPosition::Before
            } else {
                InsertPosition::After
            }
        })
        .map_err(|err| {
            Error::new(ErrorKind::Conversion)
                .with_message(format!("expected integer but got \"{raw}\""))
                .with_detail("before")
                .with_source(err)
        })
}
