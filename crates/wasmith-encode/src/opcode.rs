//! Binary-format constants: section ids, type tags, and opcodes.
//!
//! Only what the tree can express is listed; dispatch over these lives in
//! `emit.rs` for the encoder and in the runtime's interpreter loop.

// ── Module header ────────────────────────────────────────────────────────────

pub const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];
pub const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

// ── Section ids ──────────────────────────────────────────────────────────────

pub const SEC_TYPE: u8 = 1;
pub const SEC_IMPORT: u8 = 2;
pub const SEC_FUNCTION: u8 = 3;
pub const SEC_TABLE: u8 = 4;
pub const SEC_MEMORY: u8 = 5;
pub const SEC_GLOBAL: u8 = 6;
pub const SEC_EXPORT: u8 = 7;
pub const SEC_CODE: u8 = 10;
pub const SEC_DATA: u8 = 11;
pub const SEC_DATA_COUNT: u8 = 12;

// ── Type tags ────────────────────────────────────────────────────────────────

pub const TYPE_I32: u8 = 0x7F;
pub const TYPE_I64: u8 = 0x7E;
pub const TYPE_F64: u8 = 0x7C;
pub const TYPE_FUNCREF: u8 = 0x70;
pub const TYPE_FUNC: u8 = 0x60;
/// Empty block type.
pub const BLOCKTYPE_VOID: u8 = 0x40;

// ── Import/export kind tags ──────────────────────────────────────────────────

pub const KIND_FUNC: u8 = 0x00;
pub const KIND_TABLE: u8 = 0x01;
pub const KIND_MEMORY: u8 = 0x02;
pub const KIND_GLOBAL: u8 = 0x03;

// ── Control ──────────────────────────────────────────────────────────────────

pub const OP_UNREACHABLE: u8 = 0x00;
pub const OP_BLOCK: u8 = 0x02;
pub const OP_LOOP: u8 = 0x03;
pub const OP_IF: u8 = 0x04;
pub const OP_ELSE: u8 = 0x05;
pub const OP_END: u8 = 0x0B;
pub const OP_BR: u8 = 0x0C;
pub const OP_BR_IF: u8 = 0x0D;
pub const OP_RETURN: u8 = 0x0F;
pub const OP_CALL: u8 = 0x10;
pub const OP_CALL_INDIRECT: u8 = 0x11;
pub const OP_DROP: u8 = 0x1A;

// ── Variable access ──────────────────────────────────────────────────────────

pub const OP_LOCAL_GET: u8 = 0x20;
pub const OP_LOCAL_SET: u8 = 0x21;
pub const OP_GLOBAL_GET: u8 = 0x23;
pub const OP_GLOBAL_SET: u8 = 0x24;

// ── Memory access ────────────────────────────────────────────────────────────

pub const OP_I32_LOAD: u8 = 0x28;
pub const OP_I64_LOAD: u8 = 0x29;
pub const OP_F64_LOAD: u8 = 0x2B;
pub const OP_I32_LOAD8_U: u8 = 0x2D;
pub const OP_I32_STORE: u8 = 0x36;
pub const OP_I64_STORE: u8 = 0x37;
pub const OP_F64_STORE: u8 = 0x39;
pub const OP_I32_STORE8: u8 = 0x3A;
pub const OP_MEMORY_SIZE: u8 = 0x3F;
pub const OP_MEMORY_GROW: u8 = 0x40;

// ── Constants ────────────────────────────────────────────────────────────────

pub const OP_I32_CONST: u8 = 0x41;
pub const OP_I64_CONST: u8 = 0x42;
pub const OP_F64_CONST: u8 = 0x44;

// ── i32 comparisons ──────────────────────────────────────────────────────────

pub const OP_I32_EQZ: u8 = 0x45;
pub const OP_I32_EQ: u8 = 0x46;
pub const OP_I32_NE: u8 = 0x47;
pub const OP_I32_LT_S: u8 = 0x48;
pub const OP_I32_GT_S: u8 = 0x4A;
pub const OP_I32_LE_S: u8 = 0x4C;
pub const OP_I32_GE_S: u8 = 0x4E;

// ── i64 comparisons ──────────────────────────────────────────────────────────

pub const OP_I64_EQ: u8 = 0x51;
pub const OP_I64_NE: u8 = 0x52;
pub const OP_I64_LT_S: u8 = 0x53;
pub const OP_I64_GT_S: u8 = 0x55;
pub const OP_I64_LE_S: u8 = 0x57;
pub const OP_I64_GE_S: u8 = 0x59;

// ── f64 comparisons ──────────────────────────────────────────────────────────

pub const OP_F64_EQ: u8 = 0x61;
pub const OP_F64_NE: u8 = 0x62;
pub const OP_F64_LT: u8 = 0x63;
pub const OP_F64_GT: u8 = 0x64;
pub const OP_F64_LE: u8 = 0x65;
pub const OP_F64_GE: u8 = 0x66;

// ── i32 arithmetic ───────────────────────────────────────────────────────────

pub const OP_I32_CLZ: u8 = 0x67;
pub const OP_I32_CTZ: u8 = 0x68;
pub const OP_I32_POPCNT: u8 = 0x69;
pub const OP_I32_ADD: u8 = 0x6A;
pub const OP_I32_SUB: u8 = 0x6B;
pub const OP_I32_MUL: u8 = 0x6C;
pub const OP_I32_DIV_S: u8 = 0x6D;
pub const OP_I32_DIV_U: u8 = 0x6E;
pub const OP_I32_REM_S: u8 = 0x6F;
pub const OP_I32_REM_U: u8 = 0x70;
pub const OP_I32_AND: u8 = 0x71;
pub const OP_I32_OR: u8 = 0x72;
pub const OP_I32_XOR: u8 = 0x73;
pub const OP_I32_SHL: u8 = 0x74;
pub const OP_I32_SHR_S: u8 = 0x75;
pub const OP_I32_SHR_U: u8 = 0x76;
pub const OP_I32_ROTL: u8 = 0x77;
pub const OP_I32_ROTR: u8 = 0x78;

// ── i64 arithmetic ───────────────────────────────────────────────────────────

pub const OP_I64_CLZ: u8 = 0x79;
pub const OP_I64_CTZ: u8 = 0x7A;
pub const OP_I64_POPCNT: u8 = 0x7B;
pub const OP_I64_ADD: u8 = 0x7C;
pub const OP_I64_SUB: u8 = 0x7D;
pub const OP_I64_MUL: u8 = 0x7E;
pub const OP_I64_DIV_S: u8 = 0x7F;
pub const OP_I64_DIV_U: u8 = 0x80;
pub const OP_I64_REM_S: u8 = 0x81;
pub const OP_I64_REM_U: u8 = 0x82;
pub const OP_I64_AND: u8 = 0x83;
pub const OP_I64_OR: u8 = 0x84;
pub const OP_I64_XOR: u8 = 0x85;
pub const OP_I64_SHL: u8 = 0x86;
pub const OP_I64_SHR_S: u8 = 0x87;
pub const OP_I64_SHR_U: u8 = 0x88;
pub const OP_I64_ROTL: u8 = 0x89;
pub const OP_I64_ROTR: u8 = 0x8A;

// ── f64 arithmetic ───────────────────────────────────────────────────────────

pub const OP_F64_ABS: u8 = 0x99;
pub const OP_F64_NEG: u8 = 0x9A;
pub const OP_F64_CEIL: u8 = 0x9B;
pub const OP_F64_FLOOR: u8 = 0x9C;
pub const OP_F64_TRUNC: u8 = 0x9D;
pub const OP_F64_NEAREST: u8 = 0x9E;
pub const OP_F64_SQRT: u8 = 0x9F;
pub const OP_F64_ADD: u8 = 0xA0;
pub const OP_F64_SUB: u8 = 0xA1;
pub const OP_F64_MUL: u8 = 0xA2;
pub const OP_F64_DIV: u8 = 0xA3;
pub const OP_F64_MIN: u8 = 0xA4;
pub const OP_F64_MAX: u8 = 0xA5;
pub const OP_F64_COPYSIGN: u8 = 0xA6;

// ── Conversions ──────────────────────────────────────────────────────────────

pub const OP_I32_WRAP_I64: u8 = 0xA7;
pub const OP_I32_TRUNC_F64_S: u8 = 0xAA;
pub const OP_I64_EXTEND_I32_S: u8 = 0xAC;
pub const OP_I64_TRUNC_F64_S: u8 = 0xB0;
pub const OP_F64_CONVERT_I32_S: u8 = 0xB7;
pub const OP_F64_CONVERT_I64_S: u8 = 0xB9;
