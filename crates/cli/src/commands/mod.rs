pub(crate) mod create;
pub(crate) mod status;
pub(crate) mod template;
pub(crate) mod upgrade;
