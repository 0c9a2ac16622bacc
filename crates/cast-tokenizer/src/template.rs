/// A template is a row's invariant literal skeleton: `k` variable
/// placeholders interleaved with `k + 1` (possibly empty) literal runs.
/// Literal bytes never contain 0x00 — Binary Guard already rejects any
/// input with more than one NUL byte in its sample, and in practice a
/// structurable block's rows never carry one either, which is what makes
/// 0x00 safe to use as the VARIABLE sentinel in the on-disk template key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Template {
    literals: Vec<Vec<u8>>,
}

impl Template {
    pub fn from_literals(literals: Vec<Vec<u8>>) -> Self {
        debug_assert!(!literals.is_empty(), "a template always has at least one literal");
        Self { literals }
    }

    pub fn arity(&self) -> usize {
        self.literals.len() - 1
    }

    pub fn literals(&self) -> &[Vec<u8>] {
        &self.literals
    }

    /// The canonical byte key used both as the Template Registry's hash key
    /// and as the on-disk `TEMPLATE_TABLE` entry bytes (`spec.md` §4.G):
    /// literals interleaved with a 0x00 sentinel per VARIABLE.
    pub fn key_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            self.literals.iter().map(|l| l.len()).sum::<usize>() + self.literals.len(),
        );
        for (i, lit) in self.literals.iter().enumerate() {
            if i > 0 {
                out.push(0x00);
            }
            out.extend_from_slice(lit);
        }
        out
    }

    /// Inverse of `key_bytes`: splits on the 0x00 sentinel.
    pub fn from_key_bytes(bytes: &[u8]) -> Self {
        let literals = bytes.split(|&b| b == 0x00).map(|s| s.to_vec()).collect();
        Self { literals }
    }

    /// Reconstructs the original row bytes by interleaving this template's
    /// literals with the given variable field values, in order. Panics if
    /// `vars.len() != arity()` — callers own that invariant (the row-order
    /// stream and column streams are produced together and must agree).
    pub fn reconstruct(&self, vars: &[&[u8]]) -> Vec<u8> {
        assert_eq!(vars.len(), self.arity(), "variable count must match template arity");
        let mut out = Vec::new();
        for (i, lit) in self.literals.iter().enumerate() {
            out.extend_from_slice(lit);
            if i < vars.len() {
                out.extend_from_slice(vars[i]);
            }
        }
        out
    }
}
