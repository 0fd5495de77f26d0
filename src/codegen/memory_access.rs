//! Generator for the `load`/`store` members of `simdgroup_matrix_storage`.
//!
//! Each member moves the two elements a lane owns between a register and
//! linear memory. The members only differ along three axes (action, address
//! space, bfloat decoding), so they are spelled out by one function instead
//! of eight hand-written copies.
//!
//! Shape of every generated body:
//!
//! ```text
//! if (transpose_matrix) {
//!   two-part access, transposed addresses
//! } else if (elements_per_row % 2 != 0) {   // omitted for _bfloat members
//!   two-part access
//! } else {
//!   one-part access                          // two-part for store_bfloat
//! }
//! ```
//!
//! bfloat lane layout: the `float2` register is viewed as `bfloat4`. Lanes 1
//! and 3 are the upper halves of the two floats, so a bfloat placed there
//! with lanes 0 and 2 cleared *is* the widened float. No conversion
//! instruction is emitted.

use crate::codegen::address_space::{Action, AddressSpace};

/// Request for one generated member function.
///
/// `action`, `address_space` and `decoding_bf16` must all be set; generating
/// from an incomplete descriptor panics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MemoryAccessDescriptor {
    pub action: Option<Action>,
    pub address_space: Option<AddressSpace>,
    pub decoding_bf16: Option<bool>,
    /// Spaces prepended to every emitted line.
    pub indentation: usize,
}

impl MemoryAccessDescriptor {
    pub fn new(action: Action, address_space: AddressSpace, decoding_bf16: bool) -> Self {
        Self {
            action: Some(action),
            address_space: Some(address_space),
            decoding_bf16: Some(decoding_bf16),
            indentation: 0,
        }
    }

    pub fn with_indentation(mut self, indentation: usize) -> Self {
        self.indentation = indentation;
        self
    }

    /// All eight combinations, in the order they appear in the header:
    /// action, then address space, then bfloat decoding.
    pub fn all_variants(indentation: usize) -> Vec<MemoryAccessDescriptor> {
        let mut variants = Vec::with_capacity(8);
        for action in Action::ALL {
            for address_space in AddressSpace::ALL {
                for decoding_bf16 in [false, true] {
                    variants.push(Self::new(action, address_space, decoding_bf16).with_indentation(indentation));
                }
            }
        }
        variants
    }

    /// Name of the generated member, e.g. `load` or `store_bfloat`.
    pub fn function_name(&self) -> String {
        let access = self.resolve();
        let mut name = access.action.name().to_string();
        if access.decoding_bf16 {
            name.push_str("_bfloat");
        }
        name
    }

    /// Emit the member function.
    ///
    /// # Panics
    ///
    /// Panics if any of `action`, `address_space` or `decoding_bf16` is unset.
    pub fn generate(&self) -> String {
        let access = self.resolve();
        let output = access.emit_function(&" ".repeat(self.indentation));
        log::trace!(
            "generated {} for {} memory ({} bytes)",
            self.function_name(),
            access.address_space,
            output.len()
        );
        output
    }

    fn resolve(&self) -> AccessSpec {
        AccessSpec {
            action: crate::require_field!("MemoryAccessDescriptor", action, self.action),
            address_space: crate::require_field!("MemoryAccessDescriptor", address_space, self.address_space),
            decoding_bf16: crate::require_field!("MemoryAccessDescriptor", decoding_bf16, self.decoding_bf16),
        }
    }
}

/// Shorthand for [`MemoryAccessDescriptor::generate`].
pub fn create_memory_access(descriptor: &MemoryAccessDescriptor) -> String {
    descriptor.generate()
}

/// Which branch of a generated member runs for a given call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessPath {
    /// Two scalar accesses, one per lane.
    TwoPart { transposed: bool },
    /// One 2-wide (or packed 32-bit) access.
    OnePart,
}

impl AccessPath {
    /// Branch taken by the generated member at run time.
    pub fn select(action: Action, decoding_bf16: bool, transpose_matrix: bool, elements_per_row: u32) -> Self {
        if transpose_matrix {
            return AccessPath::TwoPart { transposed: true };
        }
        if decoding_bf16 {
            return match action {
                Action::Load => AccessPath::OnePart,
                Action::Store => AccessPath::TwoPart { transposed: false },
            };
        }
        if elements_per_row % 2 != 0 {
            AccessPath::TwoPart { transposed: false }
        } else {
            AccessPath::OnePart
        }
    }
}

/// A fully resolved descriptor.
#[derive(Debug, Clone, Copy)]
struct AccessSpec {
    action: Action,
    address_space: AddressSpace,
    decoding_bf16: bool,
}

impl AccessSpec {
    fn keyword(&self) -> &'static str {
        self.address_space.keyword()
    }

    fn offset_type(&self) -> &'static str {
        self.address_space.offset_type()
    }

    fn memory_type(&self) -> &'static str {
        if self.decoding_bf16 {
            "bfloat"
        } else {
            "U"
        }
    }

    fn arguments(&self) -> [String; 4] {
        let pointer = match self.action {
            Action::Load => format!("const {} {} *src", self.keyword(), self.memory_type()),
            Action::Store => format!("{} {} *dst", self.keyword(), self.memory_type()),
        };
        [
            pointer,
            format!("{} elements_per_row", self.offset_type()),
            "ushort2 matrix_origin".to_string(),
            "bool transpose_matrix = false".to_string(),
        ]
    }

    fn emit_function(&self, indentation: &str) -> String {
        let mut output = String::new();
        if self.decoding_bf16 {
            output += &format!("{indentation}// WARNING: 'T' must be 'float'.\n");
        } else {
            output += &format!("{indentation}template <typename U>\n");
        }

        let name = match self.decoding_bf16 {
            true => format!("{}_bfloat", self.action.name()),
            false => self.action.name().to_string(),
        };
        output += &format!(
            "{indentation}METAL_FUNC void {name}({}) {{\n",
            self.arguments().join(", ")
        );

        for line in self.body() {
            output += &format!("{indentation}  {line}\n");
        }
        output += &format!("{indentation}}}\n");
        output
    }

    fn body(&self) -> Vec<String> {
        let mut body = vec!["if (transpose_matrix) {".to_string()];
        insert_block(&mut body, self.two_part_access(true));

        if self.decoding_bf16 {
            let block = match self.action {
                Action::Load => self.one_part_access(),
                Action::Store => self.two_part_access(false),
            };
            body.push("} else {".to_string());
            insert_block(&mut body, block);
        } else {
            body.push("} else if (elements_per_row % 2 != 0) {".to_string());
            insert_block(&mut body, self.two_part_access(false));
            body.push("} else {".to_string());
            insert_block(&mut body, self.one_part_access());
        }
        body.push("}".to_string());
        body
    }

    fn address(&self, transposed: bool, lane: u16) -> String {
        let offset_type = self.offset_type();
        let y = format!("{offset_type}(matrix_origin.y)");
        let x = format!("{offset_type}(matrix_origin.x + {lane})");
        if transposed {
            format!("{x} * elements_per_row + {y}")
        } else {
            format!("{y} * elements_per_row + {x}")
        }
    }

    fn two_part_access(&self, transposed: bool) -> Vec<String> {
        let mut lines: Vec<String> = (0..2)
            .map(|lane| format!("{} address{lane} = {}", self.offset_type(), self.address(transposed, lane)))
            .collect();
        let memory_type = self.memory_type();

        match (self.action, self.decoding_bf16) {
            (Action::Load, true) => {
                lines.push(format!("{memory_type} memoryForm0 = src[address0]"));
                lines.push(format!("{memory_type} memoryForm1 = src[address1]"));
                lines.push(String::new());
                lines.push("bfloat4 registerForm = bfloat4(0)".into());
                lines.push("registerForm[1] = memoryForm0".into());
                lines.push("registerForm[3] = memoryForm1".into());
                lines.push("((thread bfloat4*)thread_elements())[0] = registerForm".into());
            }
            (Action::Load, false) => {
                lines.push(format!("{memory_type} memoryForm0 = src[address0]"));
                lines.push(format!("{memory_type} memoryForm1 = src[address1]"));
                lines.push("((thread T*)thread_elements())[0] = T(memoryForm0)".into());
                lines.push("((thread T*)thread_elements())[1] = T(memoryForm1)".into());
            }
            (Action::Store, true) => {
                lines.push("vec<T, 2> roundedForm = vec<T, 2>(vec<bfloat, 2>(*(thread_elements())))".into());
                lines.push("bfloat4 registerForm = *(thread bfloat4*)(&roundedForm)".into());
                lines.push("registerForm[2] = registerForm[1]".into());
                lines.push("dst[address0] = registerForm[2]".into());
                lines.push("dst[address1] = registerForm[3]".into());
            }
            (Action::Store, false) => {
                lines.push("T registerForm0 = ((thread T*)thread_elements())[0]".into());
                lines.push("T registerForm1 = ((thread T*)thread_elements())[1]".into());
                lines.push("dst[address0] = U(registerForm0)".into());
                lines.push("dst[address1] = U(registerForm1)".into());
            }
        }
        lines
    }

    fn one_part_access(&self) -> Vec<String> {
        let keyword = self.keyword();
        let mut lines = vec![format!("auto combinedAddress = {}", self.address(false, 0))];

        match (self.action, self.decoding_bf16) {
            (Action::Load, true) => {
                lines.push(format!(
                    "bfloat2 memoryForm = *(const {keyword} packed_bfloat2*)(src + combinedAddress)"
                ));
                lines.push(String::new());
                lines.push("bfloat4 registerForm = bfloat4(0)".into());
                lines.push("((thread float*)&registerForm)[1] = *(thread float*)(&memoryForm)".into());
                lines.push("((thread bfloat*)&registerForm)[1] = memoryForm[0]".into());
                lines.push("registerForm[2] = bfloat(0)".into());
                lines.push("((thread bfloat4*)thread_elements())[0] = registerForm".into());
            }
            (Action::Load, false) => {
                lines.push(format!(
                    "vec<U, 2> memoryForm = *(const {keyword} vec<U, 2>*)(src + combinedAddress)"
                ));
                lines.push("*(thread_elements()) = vec<T, 2>(memoryForm)".into());
            }
            (Action::Store, false) => {
                lines.push("vec<T, 2> registerForm = *(thread_elements())".into());
                lines.push(format!(
                    "*({keyword} vec<U, 2>*)(dst + combinedAddress) = vec<U, 2>(registerForm)"
                ));
            }
            (Action::Store, true) => {
                unreachable!("bfloat stores always take the two-part path")
            }
        }
        lines
    }
}

/// Append a block one level deeper. Whitespace-only lines become a bare
/// indent; every other line is terminated with `;`.
fn insert_block(body: &mut Vec<String>, block: Vec<String>) {
    for line in block {
        if line.chars().all(char::is_whitespace) {
            body.push("  ".to_string());
        } else {
            body.push(format!("  {line};"));
        }
    }
}
