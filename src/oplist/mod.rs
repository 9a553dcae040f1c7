mod args;
mod list;
mod opcode;
mod stream;

pub(crate) use args::{ArgReader, matrix_from_args};
pub use args::{Arg, GroupInfo, SmaskInfo, SmaskSubtype};
pub use list::{OperatorList, OperatorListChunk};
pub use opcode::OpCode;
pub use stream::{OperatorListListener, OperatorListStream};
