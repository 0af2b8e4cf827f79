//! Program-wide compiler state.
//!
//! The [`Program`] owns every function, variable, register, object type and
//! module produced by the parse, all stored in flat arenas addressed by the
//! id newtypes. It doubles as the instruction sink: [`Program::emit`]
//! appends to whichever function is currently being parsed, or to the
//! file-level body when outside any function.

use indexmap::IndexMap;

use crate::helpers::hash_hex;
use crate::ir::function::{Function, FunctionId, RawFunction};
use crate::ir::instruction::Instruction;
use crate::ir::module::{Module, ModuleId};
use crate::ir::object::{ObjectId, ObjectType};
use crate::ir::register::{Register, RegisterId};
use crate::ir::value::{ConstantKind, RbcValue};
use crate::ir::variable::{Variable, VariableId};
use crate::types::TypeInfo;

/// What kind of construct a `{` opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    If,
    Elif,
    Else,
    Function,
    Module,
    /// A bare block with no construct attached.
    Plain,
}

/// Mutable state for one compilation, parse stage.
#[derive(Debug)]
pub struct Program {
    /// Current lexical depth; incremented on every `{`.
    pub scope_depth: i32,
    pub scope_stack: Vec<ScopeKind>,
    /// Kind of the most recently closed scope, used to validate `elif` and
    /// `else` placement.
    pub last_scope: ScopeKind,

    /// File-level statements outside any function.
    pub global: RawFunction,
    pub global_variables: Vec<VariableId>,

    pub current_function: Option<FunctionId>,
    pub current_module: Option<ModuleId>,
    /// Enclosing functions when parsing nested declarations, outermost
    /// first.
    pub function_stack: Vec<FunctionId>,
    pub module_stack: Vec<ModuleId>,

    pub functions: Vec<Function>,
    pub variables: Vec<Variable>,
    pub registers: Vec<Register>,
    pub objects: Vec<ObjectType>,
    pub modules: Vec<Module>,

    /// Top-level functions by name.
    pub function_table: IndexMap<String, FunctionId>,
    /// Top-level modules by name.
    pub module_table: IndexMap<String, ModuleId>,
    /// Declared object types by name.
    pub object_table: IndexMap<String, ObjectId>,

    /// Generic parameter names of the function being parsed or
    /// instantiated, mapped to their placeholder index.
    pub generic_names: IndexMap<String, usize>,
    /// Concrete types bound to the placeholders during an instantiation;
    /// empty while parsing a declaration.
    pub generic_bindings: Vec<TypeInfo>,
}

impl Program {
    pub fn new() -> Self {
        Program {
            scope_depth: 0,
            scope_stack: Vec::new(),
            last_scope: ScopeKind::Plain,
            global: RawFunction::default(),
            global_variables: Vec::new(),
            current_function: None,
            current_module: None,
            function_stack: Vec::new(),
            module_stack: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
            registers: Vec::new(),
            objects: Vec::new(),
            modules: Vec::new(),
            function_table: IndexMap::new(),
            module_table: IndexMap::new(),
            object_table: IndexMap::new(),
            generic_names: IndexMap::new(),
            generic_bindings: Vec::new(),
        }
    }

    // Arena access.

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        &mut self.functions[id.index()]
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.index()]
    }

    pub fn variable_mut(&mut self, id: VariableId) -> &mut Variable {
        &mut self.variables[id.index()]
    }

    pub fn register(&self, id: RegisterId) -> &Register {
        &self.registers[id.index()]
    }

    pub fn register_mut(&mut self, id: RegisterId) -> &mut Register {
        &mut self.registers[id.index()]
    }

    pub fn object(&self, id: ObjectId) -> &ObjectType {
        &self.objects[id.index()]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut ObjectType {
        &mut self.objects[id.index()]
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    pub fn add_function(&mut self, function: Function) -> FunctionId {
        let id = FunctionId::new(self.functions.len() as u32);
        self.functions.push(function);
        id
    }

    pub fn add_variable(&mut self, variable: Variable) -> VariableId {
        let id = VariableId::new(self.variables.len() as u32);
        self.variables.push(variable);
        id
    }

    pub fn add_object(&mut self, object: ObjectType) -> ObjectId {
        let id = ObjectId::new(self.objects.len() as u32);
        self.objects.push(object);
        id
    }

    pub fn add_module(&mut self, module: Module) -> ModuleId {
        let id = ModuleId::new(self.modules.len() as u32);
        self.modules.push(module);
        id
    }

    // Registers.

    /// Finds a vacant register. An operable request only matches operable
    /// registers; a non-operable request takes any vacant one, since
    /// storage copies work against both classes.
    pub fn free_register(&self, operable: bool) -> Option<RegisterId> {
        self.free_register_excluding(operable, None)
    }

    /// Like [`Program::free_register`], but never returns `exclude`. The
    /// expression engine passes the register its right operand lives in:
    /// that register reads as vacant again, but its value is still needed
    /// until the combining operation has run.
    pub fn free_register_excluding(
        &self,
        operable: bool,
        exclude: Option<RegisterId>,
    ) -> Option<RegisterId> {
        self.registers
            .iter()
            .find(|reg| reg.vacant && (!operable || reg.operable) && Some(reg.id) != exclude)
            .map(|reg| reg.id)
    }

    pub fn make_register(&mut self, operable: bool, vacant: bool) -> RegisterId {
        let id = RegisterId::new(self.registers.len() as u32);
        self.registers.push(Register::new(id, operable, vacant));
        id
    }

    // Variables.

    /// Resolves a name: globals first, then the current function's locals
    /// visible at the current depth, then enclosing functions' locals.
    pub fn find_variable(&self, name: &str) -> Option<VariableId> {
        if let Some(id) = self
            .global_variables
            .iter()
            .find(|id| self.variable(**id).name == name)
        {
            return Some(*id);
        }

        let current = self.current_function?;
        if let Some(id) = self.function(current).locals.get(name) {
            if self.variable(*id).scope <= self.scope_depth {
                return Some(*id);
            }
        }

        for enclosing in self.function_stack.iter().rev() {
            if let Some(id) = self.function(*enclosing).locals.get(name) {
                return Some(*id);
            }
        }
        None
    }

    /// Records a freshly declared variable in the active locals table.
    pub fn register_local(&mut self, id: VariableId) {
        let name = self.variable(id).name.clone();
        match self.current_function {
            Some(function) => {
                self.function_mut(function).locals.insert(name, id);
            }
            None => {
                self.global.locals.insert(name, id);
                self.global_variables.push(id);
            }
        }
    }

    // Instruction sink.

    pub fn emit(&mut self, instruction: Instruction) {
        match self.current_function {
            Some(function) => self.function_mut(function).instructions.push(instruction),
            None => self.global.instructions.push(instruction),
        }
    }

    pub fn emit_all(&mut self, instructions: impl IntoIterator<Item = Instruction>) {
        for instruction in instructions {
            self.emit(instruction);
        }
    }

    // Diagnostics context.

    /// Notes describing the function nesting at the point of an error,
    /// innermost first.
    pub fn call_notes(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if let Some(current) = self.current_function {
            notes.push(format!("in function '{}'", self.function(current).name));
        }
        for enclosing in self.function_stack.iter().rev() {
            notes.push(format!("in function '{}'", self.function(*enclosing).name));
        }
        notes
    }

    // Generic instantiation support.

    /// Hash of a type-argument tuple, stable across runs.
    pub fn generics_hash(types: &[TypeInfo]) -> String {
        let mut combined = String::new();
        for info in types {
            combined.push_str(&info.to_string());
            combined.push(';');
        }
        hash_hex(&combined)
    }

    /// Deep-copies a generic declaration for one concrete type tuple.
    /// Parameters, locals and the return type are re-created with the
    /// placeholders substituted; instructions start from the declaration's
    /// (empty) list and are filled by re-parsing the body.
    pub fn specialize_function(&mut self, id: FunctionId, bindings: &[TypeInfo]) -> FunctionId {
        let base = self.function(id).clone();
        let mut variation = Function::new(base.name.clone(), base.return_type.clone());
        variation.scope = base.scope;
        variation.decorators = base.decorators.clone();
        variation.instructions = base.instructions.clone();
        variation.module_path = base.module_path.clone();
        variation.children = base.children.clone();
        variation.generics = base.generics.clone();
        variation.bound_generics = Some(bindings.to_vec());
        variation.has_body = base.has_body;
        TypeInfo::resolve_generics(&mut variation.return_type, bindings);

        for param in &base.params {
            let mut copy = self.variable(*param).clone();
            TypeInfo::resolve_generics(&mut copy.declared_type, bindings);
            TypeInfo::resolve_generics(&mut copy.inferred_type, bindings);
            let new_id = self.add_variable(copy);
            variation.params.push(new_id);
        }
        for (name, local) in &base.locals {
            // Parameters live in the locals table too; point at the copy
            // made above instead of duplicating the variable.
            if let Some(position) = base.params.iter().position(|param| param == local) {
                variation.locals.insert(name.clone(), variation.params[position]);
                continue;
            }
            let mut copy = self.variable(*local).clone();
            TypeInfo::resolve_generics(&mut copy.declared_type, bindings);
            TypeInfo::resolve_generics(&mut copy.inferred_type, bindings);
            let new_id = self.add_variable(copy);
            variation.locals.insert(name.clone(), new_id);
        }

        self.add_function(variation)
    }

    /// Target-side name of a function: ancestor name hashes, the base
    /// name, and a `_g_` suffix for generic variations.
    pub fn compiled_name(&self, id: FunctionId) -> String {
        let function = self.function(id);
        let mut chain = Vec::new();
        let mut parent = function.parent;
        while let Some(ancestor) = parent {
            chain.push(hash_hex(&self.function(ancestor).name));
            parent = self.function(ancestor).parent;
        }
        let mut name = chain.join("_");
        if !name.is_empty() {
            name.push('_');
        }
        name.push_str(&function.name);
        if function.generics.is_some() {
            if let Some(bound) = &function.bound_generics {
                name.push_str("_g_");
                name.push_str(&Self::generics_hash(bound));
            }
        }
        name
    }

    // Debug listing.

    /// Human-readable listing of the whole instruction stream, written out
    /// by the driver's debug flag.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        out.push_str("== global ==\n");
        self.dump_instructions(&self.global.instructions, &mut out);
        for (name, id) in &self.function_table {
            self.dump_function(name, *id, &mut out);
        }
        for id in self.module_table.values() {
            self.dump_module(*id, &mut out);
        }
        out
    }

    fn dump_module(&self, id: ModuleId, out: &mut String) {
        let module = self.module(id);
        for (name, function) in &module.functions {
            let qualified = format!("{}::{}", module.path.join("::"), name);
            self.dump_function(&qualified, *function, out);
        }
        for child in module.children.values() {
            self.dump_module(*child, out);
        }
    }

    fn dump_function(&self, name: &str, id: FunctionId, out: &mut String) {
        let function = self.function(id);
        if let Some(generics) = &function.generics {
            for variation in generics.variations.values() {
                let compiled = self.compiled_name(*variation);
                out.push_str(&format!("== fn {compiled} ==\n"));
                self.dump_instructions(&self.function(*variation).instructions, out);
            }
            return;
        }
        out.push_str(&format!("== fn {name} ==\n"));
        self.dump_instructions(&function.instructions, out);
        for (child_name, child) in &function.children {
            self.dump_function(child_name, *child, out);
        }
    }

    fn dump_instructions(&self, instructions: &[Instruction], out: &mut String) {
        for instruction in instructions {
            out.push_str(&instruction.op.to_string());
            for (idx, param) in instruction.params.iter().enumerate() {
                out.push_str(if idx == 0 { " " } else { ", " });
                out.push_str(&self.value_str(param));
            }
            out.push('\n');
        }
    }

    fn value_str(&self, value: &RbcValue) -> String {
        match value {
            RbcValue::Constant(constant) => {
                let kind = match constant.kind {
                    ConstantKind::Int => "int",
                    ConstantKind::Str => "str",
                    ConstantKind::Float => "float",
                    ConstantKind::List => "list",
                    ConstantKind::Selector => "selector",
                    ConstantKind::Word => "word",
                    ConstantKind::Null => "null",
                };
                format!("(const){{T={kind}, v={}}}", constant.text)
            }
            RbcValue::Register(id) => {
                let register = self.register(*id);
                format!(
                    "(reg){{id={}, op={}, vacant={}}}",
                    register.id,
                    register.operable as u8,
                    register.vacant as u8
                )
            }
            RbcValue::Variable(id) => {
                let variable = self.variable(*id);
                format!(
                    "(var){{name={}, scope={}, T={}}}",
                    variable.name, variable.scope, variable.declared_type
                )
            }
            RbcValue::Object(id) => {
                let object = self.object(*id);
                if object.name.is_empty() {
                    format!("(obj){{inline, members={}}}", object.members.len())
                } else {
                    format!("(obj){{name={}}}", object.name)
                }
            }
            RbcValue::List(list) => format!("(list){{n={}}}", list.values.len()),
            RbcValue::Function(id) => format!("(fn){{name={}}}", self.function(*id).name),
            RbcValue::Module(id) => format!("(module){{name={}}}", self.module(*id).name),
            RbcValue::Path(path) => {
                format!("(path){{{}{}}}", self.variable(path.variable).name, path)
            }
        }
    }
}

impl Default for Program {
    fn default() -> Self {
        Program::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instruction::{self, Opcode};
    use crate::lexer::Trace;
    use crate::types::type_ids;
    use text_size::{TextRange, TextSize};

    fn trace() -> Trace {
        Trace::new(TextRange::new(TextSize::new(0), TextSize::new(1)), 1, 1)
    }

    fn int_var(name: &str, scope: i32) -> Variable {
        Variable::new(name, scope, false, TypeInfo::new(type_ids::INT), trace())
    }

    #[test]
    fn free_register_respects_classes() {
        let mut program = Program::new();
        let non_operable = program.make_register(false, true);
        assert_eq!(program.free_register(true), None);
        // A non-operable request may take any vacant register.
        assert_eq!(program.free_register(false), Some(non_operable));

        let operable = program.make_register(true, true);
        assert_eq!(program.free_register(true), Some(operable));

        program.register_mut(operable).vacant = false;
        program.register_mut(non_operable).vacant = false;
        assert_eq!(program.free_register(false), None);

        program.register_mut(operable).free();
        assert_eq!(program.free_register(true), Some(operable));
    }

    #[test]
    fn emit_targets_current_function() {
        let mut program = Program::new();
        program.emit(Instruction::new(Opcode::Inc));
        assert_eq!(program.global.instructions.len(), 1);

        let function = program.add_function(Function::new("work", TypeInfo::new(type_ids::VOID)));
        program.current_function = Some(function);
        program.emit(Instruction::new(Opcode::Dec));
        assert_eq!(program.function(function).instructions.len(), 1);
        assert_eq!(program.global.instructions.len(), 1);
    }

    #[test]
    fn lookup_prefers_globals_then_scope_checked_locals() {
        let mut program = Program::new();
        let global = program.add_variable(int_var("x", 0));
        program.register_local(global);
        assert_eq!(program.find_variable("x"), Some(global));

        let function = program.add_function(Function::new("f", TypeInfo::new(type_ids::VOID)));
        program.current_function = Some(function);
        let local = program.add_variable(int_var("y", 2));
        program.register_local(local);

        // Not visible below its declaration depth.
        program.scope_depth = 1;
        assert_eq!(program.find_variable("y"), None);
        program.scope_depth = 2;
        assert_eq!(program.find_variable("y"), Some(local));
        // Globals shadow locals of the same name by search order.
        assert_eq!(program.find_variable("x"), Some(global));
    }

    #[test]
    fn specialization_resolves_parameter_types() {
        let mut program = Program::new();
        let mut function = Function::new("pick", TypeInfo::placeholder(0));
        let param = program.add_variable(Variable::new(
            "value",
            1,
            false,
            TypeInfo::placeholder(0),
            trace(),
        ));
        function.params.push(param);
        let id = program.add_function(function);

        let bindings = vec![TypeInfo::new(type_ids::STRING)];
        let variation = program.specialize_function(id, &bindings);

        let new_param = program.function(variation).params[0];
        assert_ne!(new_param, param);
        assert_eq!(
            program.variable(new_param).declared_type.type_id,
            type_ids::STRING
        );
        assert!(!program.variable(new_param).declared_type.is_generic);
        assert_eq!(
            program.function(variation).return_type.type_id,
            type_ids::STRING
        );
        // The original declaration is untouched.
        assert!(program.function(id).return_type.is_generic);
    }

    #[test]
    fn compiled_names_mangle_nesting_and_generics() {
        let mut program = Program::new();
        let outer = program.add_function(Function::new("outer", TypeInfo::new(type_ids::VOID)));
        let mut inner = Function::new("inner", TypeInfo::new(type_ids::VOID));
        inner.parent = Some(outer);
        let inner = program.add_function(inner);

        let plain = program.compiled_name(outer);
        assert_eq!(plain, "outer");
        let nested = program.compiled_name(inner);
        assert!(nested.ends_with("_inner"));
        assert_eq!(nested.len(), 12 + 1 + "inner".len());

        let bindings = vec![TypeInfo::new(type_ids::INT)];
        let hash = Program::generics_hash(&bindings);
        assert_eq!(hash, Program::generics_hash(&bindings));
        assert_ne!(hash, Program::generics_hash(&[TypeInfo::new(type_ids::STRING)]));
    }
}
