mod compilers;
mod exports;
mod imports;
mod references;
mod typescript;

pub use compilers::extract_embedded_source;
pub use exports::{Export, ExportKind, ExportMember, MemberKind, ReExport, ReExportedName};
pub use imports::{Import, ImportedName};
pub use references::{DynamicImport, FileRefs};
pub use typescript::{parse_file, parse_source, ParsedModule};
