use std::borrow::Cow;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Token {
    Word(String),
    Pipe,
    Redirect(RedirectOp),
    EOF,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectOp {
    Output,    // > 1>
    Append,    // >> 1>>
    ErrOutput, // 2>
    ErrAppend, // 2>>
}

impl Token {
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Token::Word(word) => Cow::Borrowed(word),
            Token::Pipe => Cow::Borrowed("|"),
            Token::Redirect(RedirectOp::Output) => Cow::Borrowed(">"),
            Token::Redirect(RedirectOp::Append) => Cow::Borrowed(">>"),
            Token::Redirect(RedirectOp::ErrOutput) => Cow::Borrowed("2>"),
            Token::Redirect(RedirectOp::ErrAppend) => Cow::Borrowed("2>>"),
            Token::EOF => Cow::Borrowed(""),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum LexState {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Escaped,
}

/// 把一行输入切分成 token。
///
/// 引号和转义用一个状态栈处理：在双引号里进入转义后，
/// 弹栈会回到双引号状态而不是 Normal。未闭合的引号不报错，
/// 已经累积的内容照常作为最后一个单词输出。
pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    states: Vec<LexState>,
    word: String,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
            states: vec![LexState::Normal],
            word: String::new(),
            tokens: Vec::new(),
        }
    }

    pub fn scan(mut self) -> Vec<Token> {
        while let Some(c) = self.read_char() {
            match self.state() {
                LexState::Normal => self.on_normal(c),
                LexState::SingleQuoted => self.on_single_quoted(c),
                LexState::DoubleQuoted => self.on_double_quoted(c),
                LexState::Escaped => self.on_escaped(c),
            }
        }
        self.flush_word();
        self.tokens.push(Token::EOF);
        self.tokens
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn state(&self) -> LexState {
        self.states.last().copied().unwrap_or(LexState::Normal)
    }

    fn push_state(&mut self, state: LexState) {
        self.states.push(state);
    }

    fn pop_state(&mut self) {
        // 栈底的 Normal 永远保留
        if self.states.len() > 1 {
            self.states.pop();
        }
    }

    fn flush_word(&mut self) {
        if !self.word.is_empty() {
            self.tokens.push(Token::Word(std::mem::take(&mut self.word)));
        }
    }

    fn on_normal(&mut self, c: char) {
        match c {
            '\'' => self.push_state(LexState::SingleQuoted),
            '"' => self.push_state(LexState::DoubleQuoted),
            '\\' => self.push_state(LexState::Escaped),
            ' ' => self.flush_word(),
            '|' => {
                self.flush_word();
                self.tokens.push(Token::Pipe);
            }
            '>' => {
                self.flush_word();
                let op = self.read_redirect(RedirectOp::Output, RedirectOp::Append);
                self.tokens.push(Token::Redirect(op));
            }
            '1' | '2' if self.word.is_empty() && self.peek_char() == Some('>') => {
                self.read_char();
                let op = if c == '1' {
                    self.read_redirect(RedirectOp::Output, RedirectOp::Append)
                } else {
                    self.read_redirect(RedirectOp::ErrOutput, RedirectOp::ErrAppend)
                };
                self.tokens.push(Token::Redirect(op));
            }
            c => self.word.push(c),
        }
    }

    /// 已经读过一个 `>`，再看一个字符区分截断和追加
    fn read_redirect(&mut self, truncate: RedirectOp, append: RedirectOp) -> RedirectOp {
        if self.peek_char() == Some('>') {
            self.read_char();
            append
        } else {
            truncate
        }
    }

    fn on_single_quoted(&mut self, c: char) {
        match c {
            '\'' => self.pop_state(),
            c => self.word.push(c),
        }
    }

    fn on_double_quoted(&mut self, c: char) {
        match c {
            '"' => self.pop_state(),
            '\\' => self.push_state(LexState::Escaped),
            c => self.word.push(c),
        }
    }

    fn on_escaped(&mut self, c: char) {
        self.pop_state();
        match self.state() {
            LexState::DoubleQuoted if c != '"' && c != '\\' => {
                self.word.push('\\');
                self.word.push(c);
            }
            _ => self.word.push(c),
        }
    }
}

pub fn scan(input: &str) -> Vec<Token> {
    Lexer::new(input).scan()
}
