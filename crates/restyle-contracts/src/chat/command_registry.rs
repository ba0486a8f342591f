#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upload",
        action: "upload",
    },
    CommandSpec {
        command: "download",
        action: "download",
    },
];

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "style",
        action: "apply_style",
    },
    CommandSpec {
        command: "zoom",
        action: "zoom",
    },
];

pub(crate) const QUICK_TRANSFORM_COMMANDS: &[&str] = &["male", "female"];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "styles",
        action: "list_styles",
    },
    CommandSpec {
        command: "save",
        action: "save_result",
    },
    CommandSpec {
        command: "gallery",
        action: "open_gallery",
    },
    CommandSpec {
        command: "close",
        action: "close",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const PROMPT_COMMAND: CommandSpec = CommandSpec {
    command: "prompt",
    action: "generate",
};

pub(crate) const DELETE_COMMAND: CommandSpec = CommandSpec {
    command: "delete",
    action: "delete_image",
};

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/upload <path>",
    "/styles",
    "/style <id>",
    "/male",
    "/female",
    "/prompt <text>",
    "/save",
    "/gallery",
    "/delete <id>",
    "/zoom original|result|<id>",
    "/close",
    "/download [dir]",
    "/status",
    "/help",
    "/quit",
];
