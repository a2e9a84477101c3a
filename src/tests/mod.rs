use super::*;

mod form_document_controls;
mod page_link_handshake;
mod xml_path_selection;
