/// A pet in the store
///
/// @Schema(required: [name, species])
pub struct Pet {
    /// The pet name
    ///
    /// @Property(example: Rex)
    pub name: String,
    /// @Property(type: string, description: "Species of the pet", example: dog)
    pub species: String,
    pub age: Option<u32>,
    /// @Property(ref: Owner)
    pub owner: Option<Owner>,
    #[serde(rename = "visitIds")]
    /// @Property(arrayOf: integer)
    pub visit_ids: Vec<u64>,
    #[serde(skip)]
    pub internal_notes: String,
}

pub struct Owner {
    pub name: String,
}

pub struct Envelope<T> {
    pub data: T,
}

pub struct PetController;

impl PetController {
    /// Show a pet
    ///
    /// @Response(code: 200, ref: Pet)
    /// @Response(code: 404, description: "Pet not found")
    pub fn show(&self) {}
}
