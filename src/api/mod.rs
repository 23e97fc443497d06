pub(crate) mod errors;
pub(crate) mod exam_info;
pub(crate) mod handlers;
pub(crate) mod router;
pub(crate) mod validation;
