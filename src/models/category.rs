//! Assistant categories and their static prompts.

use serde::{Deserialize, Serialize};

/// Home-maintenance domain an assistant specializes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Plumbing,
    Hvac,
    Appliances,
    PestControl,
    Roofing,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Plumbing,
        Category::Hvac,
        Category::Appliances,
        Category::PestControl,
        Category::Roofing,
    ];

    /// Short identifier used on the command line.
    pub fn slug(&self) -> &'static str {
        match self {
            Category::Plumbing => "plumbing",
            Category::Hvac => "hvac",
            Category::Appliances => "appliances",
            Category::PestControl => "pest",
            Category::Roofing => "roofing",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Plumbing => "Plumbing and Water Systems",
            Category::Hvac => "HVAC (Heating, Ventilation, and Air Conditioning)",
            Category::Appliances => "Appliance Maintenance and Repairs",
            Category::PestControl => "Pest and Bug Control",
            Category::Roofing => "Roofing, Gutter, and Exterior Maintenance",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            Category::Plumbing => {
                "You are a home maintenance assistant for plumbing and water systems. Help \
                 users troubleshoot leaks, clogs and water heater problems, give step-by-step \
                 emergency instructions, suggest preventive maintenance, and share ways to use \
                 water efficiently."
            }
            Category::Hvac => {
                "You are an HVAC maintenance assistant. Help users diagnose heating, \
                 ventilation and air conditioning problems, explain filter changes and \
                 thermostat settings, and give seasonal tips for efficient heating and cooling."
            }
            Category::Appliances => {
                "You are a household appliance assistant. Help users troubleshoot \
                 refrigerators, washers, dryers and dishwashers, give maintenance advice and \
                 fixes for common malfunctions, and help them keep track of warranty details."
            }
            Category::PestControl => {
                "You are a pest control assistant for homeowners. Help users identify common \
                 household pests, recommend safe treatment and prevention steps, and tell them \
                 when an infestation needs a professional exterminator."
            }
            Category::Roofing => {
                "You are a home maintenance assistant for roofing, gutters and exterior upkeep. \
                 Help users with roof inspections, gutter cleaning, siding care and \
                 weatherproofing, and remind them of seasonal tasks that prevent long-term \
                 damage."
            }
        }
    }

    /// Example exchange appended to the system prompt to set tone and format.
    pub fn assistant_prompt(&self) -> &'static str {
        match self {
            Category::Plumbing => {
                "Example. User: \"How do I handle a leaking pipe?\" Assistant: \"1. Shut off \
                 the water supply. 2. Put a bucket or towel under the leak. 3. Use a pipe clamp \
                 or tape as a temporary fix until a plumber arrives. Inspect pipes yearly and \
                 replace worn seals. Want tips on saving water?\""
            }
            Category::Hvac => {
                "Example. User: \"My system isn't heating, what should I check?\" Assistant: \
                 \"1. Make sure the thermostat is in heat mode at the right temperature. \
                 2. Check the air filter and replace it if clogged. 3. Look for error codes or \
                 odd noises at the furnace. If none of this helps, call a technician.\""
            }
            Category::Appliances => {
                "Example. User: \"My washing machine makes a strange noise.\" Assistant: \
                 \"1. Remove loose objects from the drum. 2. Level the machine. 3. Inspect the \
                 drive belt and motor coupler for wear. If the noise continues, it may need a \
                 repair visit. Want help checking your warranty?\""
            }
            Category::PestControl => {
                "Example. User: \"How do I keep ants out of the kitchen?\" Assistant: \
                 \"1. Clean up crumbs and spills right away. 2. Seal gaps around windows and \
                 doors. 3. Use deterrents such as vinegar or peppermint oil near entry points. \
                 Inspect problem areas regularly during warm months.\""
            }
            Category::Roofing => {
                "Example. User: \"How often should I clean my gutters?\" Assistant: \"At least \
                 twice a year, in spring and fall, and more often under heavy tree cover. \
                 Clear gutters prevent water damage. Want a roof inspection checklist?\""
            }
        }
    }

    /// Instruction sent alongside a user photo for image analysis.
    pub fn image_prompt(&self) -> &'static str {
        match self {
            Category::PestControl => {
                "Please analyze this image and identify any pest or bug issues. Describe what \
                 you see and provide relevant recommendations for treatment or control."
            }
            _ => {
                "Please analyze this image for home maintenance problems related to the \
                 conversation. Describe what you see and recommend next steps."
            }
        }
    }

    /// Full system message: role description followed by the example exchange.
    pub fn full_system_prompt(&self) -> String {
        format!("{}\n\n{}", self.system_prompt(), self.assistant_prompt())
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plumbing" | "water" => Ok(Category::Plumbing),
            "hvac" | "heating" => Ok(Category::Hvac),
            "appliances" | "appliance" => Ok(Category::Appliances),
            "pest" | "pests" | "pest-control" => Ok(Category::PestControl),
            "roofing" | "roof" | "exterior" => Ok(Category::Roofing),
            other => Err(format!(
                "unknown category: {} (expected one of: {})",
                other,
                Category::ALL.map(|c| c.slug()).join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_round_trip() {
        for category in Category::ALL {
            assert_eq!(category.slug().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn test_unknown_category_lists_options() {
        let err = "gardening".parse::<Category>().unwrap_err();
        assert!(err.contains("plumbing"));
        assert!(err.contains("roofing"));
    }

    #[test]
    fn test_full_system_prompt_includes_example() {
        let prompt = Category::Hvac.full_system_prompt();
        assert!(prompt.starts_with(Category::Hvac.system_prompt()));
        assert!(prompt.contains("thermostat"));
    }

    #[test]
    fn test_pest_image_prompt() {
        assert!(Category::PestControl.image_prompt().contains("pest"));
    }
}
