pub(crate) mod session_id;
