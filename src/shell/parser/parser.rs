use super::ast::{Command, Redirect, RedirectMode};
use super::lexer::{Lexer, RedirectOp, Token};

/// 把 token 序列解析成管道。
///
/// 语法是宽松的：重定向符后面没有文件名时直接丢弃该重定向，
/// 开头或结尾多余的 `|` 产生的空命令会被过滤掉，不会报错。
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn from_line(input: &str) -> Self {
        Self::new(Lexer::new(input).scan())
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::EOF)
    }

    fn next_token(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    pub fn parse_pipeline(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();

        loop {
            let command = self.parse_command();
            if !command.is_empty() {
                commands.push(command);
            }

            match self.current_token() {
                Token::Pipe => self.next_token(),
                _ => break,
            }
        }

        commands
    }

    fn parse_command(&mut self) -> Command {
        let mut command = Command::default();

        loop {
            match self.current_token().clone() {
                Token::EOF | Token::Pipe => break,
                Token::Word(word) => {
                    command.argv.push(word);
                    self.next_token();
                }
                Token::Redirect(op) => {
                    self.next_token();
                    if let Some(target) = self.parse_redirect_target() {
                        match op {
                            RedirectOp::Output => {
                                command.stdout = Redirect::new(RedirectMode::Truncate, target)
                            }
                            RedirectOp::Append => {
                                command.stdout = Redirect::new(RedirectMode::Append, target)
                            }
                            RedirectOp::ErrOutput => {
                                command.stderr = Redirect::new(RedirectMode::Truncate, target)
                            }
                            RedirectOp::ErrAppend => {
                                command.stderr = Redirect::new(RedirectMode::Append, target)
                            }
                        }
                    }
                }
            }
        }

        command
    }

    fn parse_redirect_target(&mut self) -> Option<String> {
        match self.current_token() {
            Token::Word(target) => {
                let target = target.clone();
                self.next_token();
                Some(target)
            }
            _ => None,
        }
    }
}

pub fn parse_pipeline(tokens: Vec<Token>) -> Vec<Command> {
    Parser::new(tokens).parse_pipeline()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Vec<Command> {
        Parser::from_line(line).parse_pipeline()
    }

    #[test]
    fn test_simple_command() {
        let commands = parse("echo hello   world");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].argv, vec!["echo", "hello", "world"]);
        assert_eq!(commands[0].program(), Some("echo"));
        assert_eq!(commands[0].arguments(), ["hello", "world"]);
        assert!(!commands[0].stdout.is_set());
        assert!(!commands[0].stderr.is_set());
    }

    #[test]
    fn test_quoted_arguments() {
        let commands = parse(r#"echo "a  b" 'c\d'"#);
        assert_eq!(commands[0].argv, vec!["echo", "a  b", r"c\d"]);
    }

    #[test]
    fn test_pipeline() {
        let commands = parse("cmd1 | cmd2 -x | cmd3");
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].argv, vec!["cmd1"]);
        assert_eq!(commands[1].argv, vec!["cmd2", "-x"]);
        assert_eq!(commands[2].argv, vec!["cmd3"]);
    }

    #[test]
    fn test_redirection() {
        let commands = parse("ls /nope 2> err.txt");
        assert_eq!(commands[0].argv, vec!["ls", "/nope"]);
        assert_eq!(
            commands[0].stderr,
            Redirect::new(RedirectMode::Truncate, "err.txt")
        );
        assert!(!commands[0].stdout.is_set());

        let commands = parse("echo hi >> log.txt 2>> err.txt");
        assert_eq!(commands[0].argv, vec!["echo", "hi"]);
        assert_eq!(
            commands[0].stdout,
            Redirect::new(RedirectMode::Append, "log.txt")
        );
        assert_eq!(
            commands[0].stderr,
            Redirect::new(RedirectMode::Append, "err.txt")
        );
    }

    #[test]
    fn test_redirect_in_the_middle_of_arguments() {
        let commands = parse("echo a 1> out.txt b");
        assert_eq!(commands[0].argv, vec!["echo", "a", "b"]);
        assert_eq!(
            commands[0].stdout,
            Redirect::new(RedirectMode::Truncate, "out.txt")
        );
    }

    #[test]
    fn test_last_redirect_wins() {
        let commands = parse("echo a > one > two");
        assert_eq!(commands[0].stdout.target, "two");
    }

    #[test]
    fn test_dangling_redirect_is_dropped() {
        let commands = parse("echo hi >");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].argv, vec!["echo", "hi"]);
        assert!(!commands[0].stdout.is_set());

        let commands = parse("echo hi > | cat");
        assert_eq!(commands.len(), 2);
        assert!(!commands[0].stdout.is_set());
        assert_eq!(commands[1].argv, vec!["cat"]);
    }

    #[test]
    fn test_redirect_per_stage() {
        let commands = parse("echo hi > a.txt | cat 2> b.txt");
        assert_eq!(commands[0].stdout.target, "a.txt");
        assert!(!commands[0].stderr.is_set());
        assert_eq!(commands[1].stderr.target, "b.txt");
        assert!(!commands[1].stdout.is_set());
    }

    #[test]
    fn test_empty_stages_are_filtered() {
        assert!(parse("").is_empty());
        assert!(parse("|").is_empty());
        let commands = parse("| ls |");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].argv, vec!["ls"]);
    }

    #[test]
    fn test_plain_words_match_whitespace_split() {
        let line = "grep  -rn   needle src";
        let commands = parse(line);
        let expected: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(commands[0].argv, expected);
    }

    #[test]
    fn test_parse_pipeline_from_tokens() {
        let tokens = vec![
            Token::Word("cat".to_string()),
            Token::Pipe,
            Token::Word("wc".to_string()),
            Token::EOF,
        ];
        let commands = parse_pipeline(tokens);
        assert_eq!(commands.len(), 2);
    }
}
