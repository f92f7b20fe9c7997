//! Whitespace tokenizer and the small amount of syntax the shell understands:
//! `|` between stages, `<`/`>` redirections and a trailing `&`.

use crate::command::{CommandSpec, ParsedLine, PipelineSpec, RedirectionSpec};
use crate::error::SyntaxError;

pub const PIPE: &str = "|";
pub const INPUT: &str = "<";
pub const OUTPUT: &str = ">";
pub const BACKGROUND: &str = "&";

fn is_operator(tok: &str) -> bool { matches!(tok, PIPE | INPUT | OUTPUT | BACKGROUND) }

pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

/// Parse a non-empty token list. Callers handle the empty line themselves.
pub fn parse(tokens: &[String]) -> Result<ParsedLine, SyntaxError> {
    if tokens.iter().any(|t| t == PIPE) { return parse_pipeline(tokens); }
    parse_single(tokens)
}

fn parse_pipeline(tokens: &[String]) -> Result<ParsedLine, SyntaxError> {
    let mut stages = Vec::new();
    for seg in tokens.split(|t| t == PIPE) {
        if seg.is_empty() { return Err(SyntaxError::EmptyStage); }
        if seg.iter().any(|t| t == BACKGROUND) { return Err(SyntaxError::PipelineBackground); }
        if seg.iter().any(|t| t == INPUT || t == OUTPUT) { return Err(SyntaxError::PipelineRedirect); }
        stages.extend(CommandSpec::new(seg.to_vec()));
    }
    PipelineSpec::new(stages).map(ParsedLine::Pipeline).ok_or(SyntaxError::EmptyStage)
}

fn parse_single(tokens: &[String]) -> Result<ParsedLine, SyntaxError> {
    let split = tokens.iter().position(|t| is_operator(t)).unwrap_or(tokens.len());
    let command = CommandSpec::new(tokens[..split].to_vec()).ok_or(SyntaxError::MissingCommand)?;
    let mut redirection = RedirectionSpec::default();
    let mut background = false;
    let mut i = split;
    while i < tokens.len() {
        match tokens[i].as_str() {
            INPUT => {
                if redirection.input.is_some() { return Err(SyntaxError::DuplicateRedirect(INPUT)); }
                redirection.input = Some(target(tokens, i, INPUT)?.into());
                i += 2;
                // an input file may only be followed by the output half
                match tokens.get(i).map(String::as_str) {
                    None | Some(OUTPUT) | Some(BACKGROUND) => {}
                    Some(other) => return Err(SyntaxError::ExpectedOutput { found: other.to_string() }),
                }
            }
            OUTPUT => {
                if redirection.output.is_some() { return Err(SyntaxError::DuplicateRedirect(OUTPUT)); }
                redirection.output = Some(target(tokens, i, OUTPUT)?.into());
                i += 2;
            }
            BACKGROUND => {
                if i + 1 != tokens.len() { return Err(SyntaxError::MisplacedBackground); }
                background = true;
                i += 1;
            }
            other => return Err(SyntaxError::UnexpectedToken(other.to_string())),
        }
    }
    Ok(ParsedLine::Single { command, redirection, background })
}

fn target<'a>(tokens: &'a [String], op_at: usize, op: &'static str) -> Result<&'a String, SyntaxError> {
    tokens.get(op_at + 1).filter(|t| !is_operator(t)).ok_or(SyntaxError::MissingTarget(op))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn p(line: &str) -> Result<ParsedLine, SyntaxError> { parse(&tokenize(line)) }

    fn single(line: &str) -> (Vec<String>, RedirectionSpec, bool) {
        match p(line).unwrap() {
            ParsedLine::Single { command, redirection, background } => (command.argv().to_vec(), redirection, background),
            other => panic!("expected single command, got {other:?}"),
        }
    }

    #[test]
    fn tokenize_collapses_whitespace() {
        assert_eq!(tokenize("  ls\t-l  /tmp \n"), vec!["ls", "-l", "/tmp"]);
        assert!(tokenize(" \t\n").is_empty());
    }

    #[test]
    fn plain_command() {
        let (argv, redir, bg) = single("echo a b");
        assert_eq!(argv, vec!["echo", "a", "b"]);
        assert!(redir.is_empty());
        assert!(!bg);
    }

    #[test]
    fn background_marker() {
        let (argv, _, bg) = single("sleep 1 &");
        assert_eq!(argv, vec!["sleep", "1"]);
        assert!(bg);
        assert_eq!(p("sleep & 1"), Err(SyntaxError::MisplacedBackground));
    }

    #[test]
    fn output_redirection() {
        let (argv, redir, _) = single("ls -l > out.txt");
        assert_eq!(argv, vec!["ls", "-l"]);
        assert_eq!(redir.output, Some(PathBuf::from("out.txt")));
        assert_eq!(redir.input, None);
    }

    #[test]
    fn input_and_output_redirection() {
        let (argv, redir, bg) = single("sort < in.txt > out.txt &");
        assert_eq!(argv, vec!["sort"]);
        assert_eq!(redir.input, Some(PathBuf::from("in.txt")));
        assert_eq!(redir.output, Some(PathBuf::from("out.txt")));
        assert!(bg);
        let (_, redir, _) = single("sort > out.txt < in.txt");
        assert_eq!(redir.input, Some(PathBuf::from("in.txt")));
    }

    #[test]
    fn malformed_redirections() {
        assert_eq!(p("cmd >"), Err(SyntaxError::MissingTarget(">")));
        assert_eq!(p("cmd < in >"), Err(SyntaxError::MissingTarget(">")));
        assert_eq!(p("cmd <"), Err(SyntaxError::MissingTarget("<")));
        assert_eq!(p("cmd > &"), Err(SyntaxError::MissingTarget(">")));
        assert_eq!(p("cmd < in out"), Err(SyntaxError::ExpectedOutput { found: "out".into() }));
        assert_eq!(p("cmd > a > b"), Err(SyntaxError::DuplicateRedirect(">")));
        assert_eq!(p("cmd > a extra"), Err(SyntaxError::UnexpectedToken("extra".into())));
        assert_eq!(p("> out"), Err(SyntaxError::MissingCommand));
    }

    #[test]
    fn pipeline_stages() {
        match p("printf a | sort -r | head -n 1").unwrap() {
            ParsedLine::Pipeline(spec) => {
                let argvs: Vec<_> = spec.stages().iter().map(|c| c.argv().join(" ")).collect();
                assert_eq!(argvs, vec!["printf a", "sort -r", "head -n 1"]);
            }
            other => panic!("expected pipeline, got {other:?}"),
        }
    }

    #[test]
    fn malformed_pipelines() {
        assert_eq!(p("a | | b"), Err(SyntaxError::EmptyStage));
        assert_eq!(p("| a"), Err(SyntaxError::EmptyStage));
        assert_eq!(p("a |"), Err(SyntaxError::EmptyStage));
        assert_eq!(p("a | b > out"), Err(SyntaxError::PipelineRedirect));
        assert_eq!(p("a < in | b"), Err(SyntaxError::PipelineRedirect));
        assert_eq!(p("a | b &"), Err(SyntaxError::PipelineBackground));
    }
}
