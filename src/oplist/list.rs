use crate::oplist::{Arg, OpCode};

/// Append-only operator list: parallel code and argument arrays.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct OperatorList {
    /// Operator codes (see [`OpCode`]).
    pub fn_array: Vec<u8>,
    /// Arguments, one list per code.
    pub args_array: Vec<Vec<Arg>>,
    /// `true` once the producer has delivered the final chunk.
    #[serde(default)]
    pub last_chunk: bool,
}

/// A batch of entries delivered by the producer.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct OperatorListChunk {
    /// Operator codes.
    pub fn_array: Vec<u8>,
    /// Arguments, one list per code.
    pub args_array: Vec<Vec<Arg>>,
    /// Marks the final chunk of the page.
    #[serde(default)]
    pub last_chunk: bool,
}

impl OperatorListChunk {
    /// Empty, non-final chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry.
    pub fn push(&mut self, op: OpCode, args: Vec<Arg>) -> &mut Self {
        self.fn_array.push(op.code());
        self.args_array.push(args);
        self
    }

    /// Mark this chunk as the final one.
    pub fn finished(mut self) -> Self {
        self.last_chunk = true;
        self
    }
}

impl OperatorList {
    /// Empty, open list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry.
    pub fn push(&mut self, op: OpCode, args: Vec<Arg>) -> &mut Self {
        self.push_raw(op.code(), args)
    }

    /// Append an entry by raw code; unknown codes are kept and skipped at execution time.
    pub fn push_raw(&mut self, code: u8, args: Vec<Arg>) -> &mut Self {
        self.fn_array.push(code);
        self.args_array.push(args);
        self
    }

    /// Append a producer chunk, adopting its final-chunk flag.
    pub fn append(&mut self, chunk: OperatorListChunk) {
        let OperatorListChunk {
            fn_array,
            args_array,
            last_chunk,
        } = chunk;
        self.fn_array.extend(fn_array);
        self.args_array.extend(args_array);
        self.last_chunk = last_chunk;
    }

    /// Mark the list complete.
    pub fn finished(mut self) -> Self {
        self.last_chunk = true;
        self
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.fn_array.len().min(self.args_array.len())
    }

    /// `true` when no entries have arrived yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw code and arguments of entry `i`.
    pub fn entry(&self, i: usize) -> Option<(u8, &[Arg])> {
        let code = *self.fn_array.get(i)?;
        let args = self.args_array.get(i)?;
        Some((code, args.as_slice()))
    }
}
