//! 终端命令

use std::path::PathBuf;

use protocol::Move;

use crate::error::CommandError;
use crate::settings::ThinkTime;

/// 用户输入的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// 走子
    Move(Move),
    /// 发送聊天
    Chat(String),
    /// 重新开局
    Reset,
    /// 保存局面；不给路径时存入默认存档目录
    Save(Option<PathBuf>),
    /// 载入局面
    Load(PathBuf),
    /// 请求提示
    Hint,
    /// 列出默认存档目录中的存档
    Saves,
    /// 列出当前局面的合法走法
    Moves,
    /// 设置 AI 思考时间；不给值时切换到下一档
    Think(Option<ThinkTime>),
    Help,
    Quit,
}

impl UserCommand {
    /// 解析一行输入
    ///
    /// 单独的坐标记号（如 `e2e4`）视为走子。
    pub fn parse(line: &str) -> Result<UserCommand, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "move" | "m" => {
                let token = required(rest, "move")?;
                Ok(UserCommand::Move(Move::parse(token)?))
            }
            "chat" | "say" => Ok(UserCommand::Chat(required(rest, "chat")?.to_string())),
            "reset" => Ok(UserCommand::Reset),
            "save" => Ok(UserCommand::Save(
                (!rest.is_empty()).then(|| PathBuf::from(rest)),
            )),
            "load" => Ok(UserCommand::Load(PathBuf::from(required(rest, "load")?))),
            "hint" => Ok(UserCommand::Hint),
            "saves" => Ok(UserCommand::Saves),
            "moves" | "legal" => Ok(UserCommand::Moves),
            "think" if rest.is_empty() => Ok(UserCommand::Think(None)),
            "think" => ThinkTime::from_seconds(rest)
                .map(|t| UserCommand::Think(Some(t)))
                .ok_or_else(|| CommandError::InvalidArgument {
                    command: "think",
                    value: rest.to_string(),
                }),
            "help" | "?" => Ok(UserCommand::Help),
            "quit" | "exit" => Ok(UserCommand::Quit),
            _ if rest.is_empty() => Move::parse(word)
                .map(UserCommand::Move)
                .map_err(|_| CommandError::Unknown(word.to_string())),
            _ => Err(CommandError::Unknown(word.to_string())),
        }
    }

    /// 命令帮助
    pub fn help() -> &'static str {
        "move <e2e4>   走子（也可直接输入 e2e4，升变如 e7e8q）\n\
         chat <text>   发送聊天\n\
         reset         重新开局\n\
         save [path]   保存当前局面\n\
         load <path>   载入局面\n\
         saves         列出存档\n\
         moves         列出当前局面的合法走法\n\
         hint          请求引擎提示\n\
         think [秒]    设置 AI 思考时间（0.5/1/2/3），不给值时切换到下一档\n\
         quit          退出"
    }
}

fn required<'a>(rest: &'a str, command: &'static str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument { command })
    } else {
        Ok(rest)
    }
}
