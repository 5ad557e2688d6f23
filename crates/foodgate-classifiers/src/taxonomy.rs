//! Curated ImageNet-1k label taxonomy
//!
//! Maps class indices of a 1000-way ImageNet classifier to one of three
//! categories: actual food, food-related (containers, cookware, beverage
//! vessels, food venues) or neither. Unlisted indices are "neither".
//!
//! Food-related classes count toward the accept decision because photos of
//! meals frequently score highest on the vessel ("soup bowl", "plate")
//! rather than on the dish itself.

use serde::{Deserialize, Serialize};

/// Output index of the classifier
pub type ClassIndex = usize;

/// Semantic category of a class index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodCategory {
    /// Unambiguously food or drink
    Food,
    /// Strongly correlated with food being in frame
    FoodRelated,
    /// Everything else
    Neither,
}

/// Classes that are literally food. Sorted by index.
pub const FOOD_CLASSES: &[(ClassIndex, &str)] = &[
    (924, "guacamole"),
    (925, "consomme"),
    (926, "hot pot"),
    (927, "trifle"),
    (928, "ice cream"),
    (929, "ice lolly"),
    (930, "French loaf"),
    (931, "bagel"),
    (932, "pretzel"),
    (933, "cheeseburger"),
    (934, "hotdog"),
    (935, "mashed potato"),
    (936, "head cabbage"),
    (937, "broccoli"),
    (938, "cauliflower"),
    (939, "zucchini"),
    (940, "spaghetti squash"),
    (941, "acorn squash"),
    (942, "butternut squash"),
    (943, "cucumber"),
    (944, "artichoke"),
    (945, "bell pepper"),
    (946, "cardoon"),
    (947, "mushroom"),
    (948, "Granny Smith"),
    (949, "strawberry"),
    (950, "orange"),
    (951, "lemon"),
    (952, "fig"),
    (953, "pineapple"),
    (954, "banana"),
    (955, "jackfruit"),
    (956, "custard apple"),
    (957, "pomegranate"),
    (959, "carbonara"),
    (960, "chocolate sauce"),
    (961, "dough"),
    (962, "meat loaf"),
    (963, "pizza"),
    (964, "potpie"),
    (965, "burrito"),
    (966, "red wine"),
    (967, "espresso"),
    (969, "eggnog"),
    (987, "corn"),
    (998, "ear"),
];

/// Containers, cookware and places that imply food. Sorted by index.
pub const FOOD_RELATED_CLASSES: &[(ClassIndex, &str)] = &[
    (415, "bakery"),
    (440, "beer bottle"),
    (441, "beer glass"),
    (467, "butcher shop"),
    (469, "caldron"),
    (504, "coffee mug"),
    (505, "coffeepot"),
    (521, "Crock Pot"),
    (532, "dining table"),
    (544, "Dutch oven"),
    (550, "espresso maker"),
    (567, "frying pan"),
    (572, "goblet"),
    (582, "grocery store"),
    (618, "ladle"),
    (647, "measuring cup"),
    (659, "mixing bowl"),
    (737, "pop bottle"),
    (762, "restaurant"),
    (766, "rotisserie"),
    (809, "soup bowl"),
    (813, "spatula"),
    (828, "strainer"),
    (849, "teapot"),
    (868, "tray"),
    (898, "water bottle"),
    (899, "water jug"),
    (901, "whiskey jug"),
    (907, "wine bottle"),
    (909, "wok"),
    (910, "wooden spoon"),
    (923, "plate"),
    (968, "cup"),
];

fn lookup(table: &[(ClassIndex, &'static str)], index: ClassIndex) -> Option<&'static str> {
    table
        .binary_search_by_key(&index, |(i, _)| *i)
        .ok()
        .map(|pos| table[pos].1)
}

/// Membership in the combined food plus food-related set
pub fn is_food_class(index: ClassIndex) -> bool {
    is_actual_food(index) || lookup(FOOD_RELATED_CLASSES, index).is_some()
}

/// Membership in the actual food set only
pub fn is_actual_food(index: ClassIndex) -> bool {
    lookup(FOOD_CLASSES, index).is_some()
}

/// Human-readable label for curated indices
pub fn label_name(index: ClassIndex) -> Option<&'static str> {
    lookup(FOOD_CLASSES, index).or_else(|| lookup(FOOD_RELATED_CLASSES, index))
}

/// Category of an index; unlisted indices are [`FoodCategory::Neither`]
pub fn category(index: ClassIndex) -> FoodCategory {
    if is_actual_food(index) {
        FoodCategory::Food
    } else if is_food_class(index) {
        FoodCategory::FoodRelated
    } else {
        FoodCategory::Neither
    }
}

/// Every index in the combined set, ascending
pub fn combined_food_indices() -> impl Iterator<Item = ClassIndex> {
    let mut all: Vec<ClassIndex> = FOOD_CLASSES
        .iter()
        .chain(FOOD_RELATED_CLASSES)
        .map(|(i, _)| *i)
        .collect();
    all.sort_unstable();
    all.dedup();
    all.into_iter()
}
