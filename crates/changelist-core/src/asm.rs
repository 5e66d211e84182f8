//! Assembleur texte minimal, au-dessus de [`ChangeListBuilder`].
//!
//! Une instruction par ligne, mnémoniques de [`OpCode::mnemonic`] :
//!
//! ```text
//! ; commentaire
//! push_first_child
//! create_element "div"
//! set_attribute "class" "box"
//! new_event_listener "click" 1 2
//! append_child
//! pop
//! raw 99
//! ```
//!
//! Les opérandes texte sont des littéraux entre guillemets (`\"`, `\\`, `\n`,
//! `\t` reconnus) ; ils passent par la table de chaînes du builder, sauf pour
//! `set_text`/`create_text_node` qui embarquent `(ptr, len)`. `add_string "x" 7`
//! fixe un id explicite, `raw <u32>` émet un mot tel quel.

#[cfg(not(feature = "std"))]
use alloc::{format, string::String, vec::Vec};
#[cfg(feature = "std")]
use std::{format, string::String, vec::Vec};

use crate::{Assembled, ChangeListBuilder, DecodeError, DecodeResult, OpCode};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Str(String),
}

/// Assemble une source complète.
pub fn assemble(source: &str) -> DecodeResult<Assembled> {
    let mut b = ChangeListBuilder::new();
    assemble_into(&mut b, source)?;
    Ok(b.finish())
}

/// Assemble `source` à la suite de ce que contient déjà `b`.
pub fn assemble_into(b: &mut ChangeListBuilder, source: &str) -> DecodeResult<()> {
    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        let tokens = tokenize(line, line_no)?;
        let (head, args) = match tokens.split_first() {
            Some((Token::Word(w), rest)) => (w.as_str(), rest),
            _ => return Err(DecodeError::asm(line_no, "mnémonique attendu")),
        };

        if head == "raw" {
            let word = int_arg(args, 0, line_no)?;
            expect_arity(args, 1, line_no)?;
            b.raw_word(word);
            continue;
        }

        let code = OpCode::from_mnemonic(head)
            .ok_or_else(|| DecodeError::asm(line_no, format!("instruction inconnue `{head}`")))?;
        match code {
            OpCode::SetText => {
                expect_arity(args, 1, line_no)?;
                b.set_text(&str_arg(args, 0, line_no)?);
            }
            OpCode::CreateTextNode => {
                expect_arity(args, 1, line_no)?;
                b.create_text_node(&str_arg(args, 0, line_no)?);
            }
            OpCode::SetAttribute => {
                expect_arity(args, 2, line_no)?;
                let (name, value) = (str_arg(args, 0, line_no)?, str_arg(args, 1, line_no)?);
                b.set_attribute(&name, &value).map_err(at_line(line_no))?;
            }
            OpCode::RemoveAttribute => {
                expect_arity(args, 1, line_no)?;
                b.remove_attribute(&str_arg(args, 0, line_no)?).map_err(at_line(line_no))?;
            }
            OpCode::CreateElement => {
                expect_arity(args, 1, line_no)?;
                b.create_element(&str_arg(args, 0, line_no)?).map_err(at_line(line_no))?;
            }
            OpCode::NewEventListener | OpCode::UpdateEventListener => {
                expect_arity(args, 3, line_no)?;
                let event = str_arg(args, 0, line_no)?;
                let a = int_arg(args, 1, line_no)?;
                let bb = int_arg(args, 2, line_no)?;
                let emitted = if code == OpCode::NewEventListener {
                    b.new_event_listener(&event, a, bb)
                } else {
                    b.update_event_listener(&event, a, bb)
                };
                emitted.map_err(at_line(line_no))?;
            }
            OpCode::RemoveEventListener => {
                expect_arity(args, 1, line_no)?;
                b.remove_event_listener(&str_arg(args, 0, line_no)?).map_err(at_line(line_no))?;
            }
            OpCode::AddString => {
                expect_arity(args, 2, line_no)?;
                let text = str_arg(args, 0, line_no)?;
                b.add_string(&text, int_arg(args, 1, line_no)?);
            }
            OpCode::RemoveSelfAndNextSiblings => {
                expect_arity(args, 0, line_no)?;
                b.remove_self_and_next_siblings();
            }
            OpCode::ReplaceWith => {
                expect_arity(args, 0, line_no)?;
                b.replace_with();
            }
            OpCode::PushFirstChild => {
                expect_arity(args, 0, line_no)?;
                b.push_first_child();
            }
            OpCode::PopPushNextSibling => {
                expect_arity(args, 0, line_no)?;
                b.pop_push_next_sibling();
            }
            OpCode::Pop => {
                expect_arity(args, 0, line_no)?;
                b.pop();
            }
            OpCode::AppendChild => {
                expect_arity(args, 0, line_no)?;
                b.append_child();
            }
        }
    }
    Ok(())
}

/// Rattache une erreur du builder à la ligne source.
fn at_line(line: u32) -> impl Fn(DecodeError) -> DecodeError {
    move |e| match e {
        DecodeError::Asm { .. } => e,
        other => DecodeError::asm(line, format!("{other}")),
    }
}

fn expect_arity(args: &[Token], n: usize, line: u32) -> DecodeResult<()> {
    if args.len() == n {
        Ok(())
    } else {
        Err(DecodeError::asm(line, format!("{n} opérande(s) attendu(s), {} reçu(s)", args.len())))
    }
}

fn str_arg(args: &[Token], ix: usize, line: u32) -> DecodeResult<String> {
    match args.get(ix) {
        Some(Token::Str(s)) => Ok(s.clone()),
        _ => Err(DecodeError::asm(line, format!("opérande {ix}: chaîne attendue"))),
    }
}

fn int_arg(args: &[Token], ix: usize, line: u32) -> DecodeResult<u32> {
    match args.get(ix) {
        Some(Token::Word(w)) => w
            .parse::<u32>()
            .map_err(|_| DecodeError::asm(line, format!("opérande {ix}: entier attendu, `{w}`"))),
        _ => Err(DecodeError::asm(line, format!("opérande {ix}: entier attendu"))),
    }
}

fn tokenize(line: &str, line_no: u32) -> DecodeResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == ';' {
            break;
        }
        if c == '"' {
            chars.next();
            let mut s = String::new();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some('"') => s.push('"'),
                        Some('\\') => s.push('\\'),
                        Some(other) => {
                            return Err(DecodeError::asm(line_no, format!("échappement inconnu `\\{other}`")))
                        }
                        None => return Err(DecodeError::asm(line_no, "chaîne non terminée")),
                    },
                    Some(ch) => s.push(ch),
                    None => return Err(DecodeError::asm(line_no, "chaîne non terminée")),
                }
            }
            tokens.push(Token::Str(s));
            continue;
        }
        let mut w = String::new();
        while let Some(&ch) = chars.peek() {
            if ch.is_whitespace() || ch == '"' || ch == ';' {
                break;
            }
            w.push(ch);
            chars.next();
        }
        tokens.push(Token::Word(w));
    }
    Ok(tokens)
}
