use colored::Colorize;

pub struct Theme {
    pub prompt: String,
    pub goodbye_message: String,
    pub error_style: Box<dyn Fn(String) -> String>,
    pub warning_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            prompt: "$ ".bright_cyan().to_string(),
            goodbye_message: String::new(),
            error_style: Box::new(|s| s.bright_red().to_string()),
            warning_style: Box::new(|s| s.yellow().to_string()),
        }
    }
}

impl Theme {
    pub fn load_theme(theme_name: &str) -> Theme {
        match theme_name {
            "default" => Theme::default(),
            "plain" => Theme {
                prompt: "$ ".to_string(),
                goodbye_message: String::new(),
                error_style: Box::new(|s| s),
                warning_style: Box::new(|s| s),
            },
            "verbose" => Theme {
                prompt: "kosh$ ".bright_green().to_string(),
                goodbye_message: "bye".bright_blue().to_string(),
                error_style: Box::new(|s| s.red().bold().to_string()),
                warning_style: Box::new(|s| s.bright_yellow().to_string()),
            },
            _ => Theme::default(),
        }
    }
}
